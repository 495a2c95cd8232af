// Utilitários para manipulação de valores monetários

use rust_decimal::Decimal;

/// Coarse amount range used as a log field at intake.
pub fn amount_bucket(amount: Decimal) -> &'static str {
    if amount <= Decimal::from(10) {
        "0-10"
    } else if amount <= Decimal::from(50) {
        "11-50"
    } else if amount <= Decimal::from(100) {
        "51-100"
    } else if amount <= Decimal::from(500) {
        "101-500"
    } else if amount <= Decimal::from(1000) {
        "501-1000"
    } else {
        "1000+"
    }
}

pub fn format_amount(amount: Decimal, currency: &str) -> String {
    format!("{} {}", amount.round_dp(2), currency)
}

pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_bucket() {
        assert_eq!(amount_bucket(dec!(10.00)), "0-10");
        assert_eq!(amount_bucket(dec!(10.01)), "11-50");
        assert_eq!(amount_bucket(dec!(100)), "51-100");
        assert_eq!(amount_bucket(dec!(499.99)), "101-500");
        assert_eq!(amount_bucket(dec!(1000)), "501-1000");
        assert_eq!(amount_bucket(dec!(1000.01)), "1000+");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(10), "USD"), "10 USD");
        assert_eq!(format_amount(dec!(25.505), "EUR"), "25.50 EUR");
    }

    #[test]
    fn test_currency_code() {
        assert!(is_currency_code("ETB"));
        assert!(!is_currency_code("usd"));
        assert!(!is_currency_code("USDT"));
    }
}
