//! Dell dialects.

use crate::platform::Dialect;

/// Dell Force10 (FTOS) switches.
pub fn force10() -> Dialect {
    Dialect::new("dell_force10", "Dell", "force10", "#")
        .with_error_mark("% Error: ")
        .with_config_term_cmd("terminal length 0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ErrorMark;
    use crate::transport::LineEnding;

    #[test]
    fn test_force10_dialect() {
        let dialect = force10();
        assert_eq!(dialect.name, "dell_force10");
        assert_eq!(dialect.line_ending, LineEnding::CrLf);

        let mark = ErrorMark::new(dialect.error_mark.as_deref().unwrap()).unwrap();
        assert_eq!(
            mark.find_message("% Error: Port is not in Layer-2 mode Te 0/1.").as_deref(),
            Some("% Error: Port is not in Layer-2 mode Te 0/1.")
        );
    }
}
