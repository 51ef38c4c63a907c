use rust_decimal::Decimal;

/// Format an amount with a currency symbol and thousands separators: $1,234.56
pub fn money(symbol: &str, val: Decimal) -> String {
    let negative = val.is_sign_negative() && !val.is_zero();
    let cents = format!("{:.2}", val.abs().round_dp(2));
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-{symbol}{with_commas}.{dec_part}")
    } else {
        format!("{symbol}{with_commas}.{dec_part}")
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
