/// Short-form money: `KSh 1.25M`, `KSh 12.5K`, `KSh 950`. Zero, absent, and
/// non-finite amounts all render as `KSh 0`.
pub fn format_money(amount: Option<f64>, currency: &str) -> String {
    let amount = match amount {
        Some(value) if value.is_finite() && value != 0.0 => value,
        _ => return format!("{currency} 0"),
    };

    if amount >= 1_000_000_000.0 {
        format!("{currency} {:.2}B", amount / 1_000_000_000.0)
    } else if amount >= 1_000_000.0 {
        format!("{currency} {:.2}M", amount / 1_000_000.0)
    } else if amount >= 1_000.0 {
        format!("{currency} {:.1}K", amount / 1_000.0)
    } else {
        format!("{currency} {}", group_thousands(amount))
    }
}

/// Average score card value; an empty period shows a dash.
pub fn format_score(score: f64) -> String {
    if score == 0.0 {
        return "—".to_string();
    }
    trim_decimals(score)
}

/// Approval rate card value; a period without applications shows a dash.
pub fn format_rate(approvals: usize, total: usize) -> String {
    if total == 0 {
        return "—".to_string();
    }
    format!("{}%", super::numeric::percent_of(approvals, total))
}

fn trim_decimals(value: f64) -> String {
    let rendered = format!("{value:.2}");
    rendered
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn group_thousands(value: f64) -> String {
    let rendered = trim_decimals(value.abs());
    let (whole, fraction) = match rendered.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (rendered.as_str(), None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}
