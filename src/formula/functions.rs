//! The fixed set of function names the reference grammar accepts.
//!
//! Arguments of every function are parsed recursively for references; the engine
//! never evaluates them.

pub const BUILTIN_FUNCTIONS: &[&str] = &[
    // Aggregates
    "SUM", "AVERAGE", "MIN", "MAX", "COUNT", "COUNTA", "MEDIAN", "PRODUCT", "SUMPRODUCT",
    "SUMIF", "SUMIFS", "COUNTIF", "COUNTIFS", "AVERAGEIF", "LARGE", "SMALL", "STDEV",
    "STDEV.S", "STDEV.P",
    // Logic
    "IF", "IFERROR", "AND", "OR", "NOT", "ISBLANK", "ISNUMBER", "ISERROR",
    // Math
    "ABS", "ROUND", "ROUNDUP", "ROUNDDOWN", "POWER", "SQRT", "EXP", "LN", "LOG", "LOG10",
    "INT", "MOD", "SIGN",
    // Lookup
    "INDEX", "MATCH", "VLOOKUP", "HLOOKUP", "OFFSET", "CHOOSE",
    // Finance
    "NPV", "XNPV", "IRR", "XIRR", "PMT", "PV", "FV", "RATE",
    // Dates and text
    "DATE", "YEAR", "MONTH", "DAY", "EOMONTH", "EDATE", "TODAY", "TEXT", "CONCATENATE",
    // Data-provider functions exposed by the workbook add-in
    "DCF_PRICE", "DCF_MARKET_CAP", "DCF_BETA", "DCF_SHARES_OUT", "DCF_52W_HIGH",
    "DCF_52W_LOW", "DCF_RISK_FREE", "DCF_REVENUE", "DCF_EBITDA", "DCF_WACC", "DCF_EV",
    "DCF_PE",
];

/// `name` must already be upper-cased.
pub fn is_known(name: &str, extra: &[String]) -> bool {
    BUILTIN_FUNCTIONS.contains(&name) || extra.iter().any(|e| e.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_functions() {
        assert!(is_known("SUM", &[]));
        assert!(is_known("DCF_WACC", &[]));
        assert!(!is_known("XLOOKUP", &[]));
        assert!(is_known("XLOOKUP", &["xlookup".to_string()]));
    }
}
