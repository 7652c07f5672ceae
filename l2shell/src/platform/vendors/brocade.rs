//! Brocade dialects.
//!
//! Both families end their prompt with `#` and accept `terminal length 0`
//! to disable paging. The VDX (Network OS) shell wants bare `\n` line
//! endings.

use crate::platform::Dialect;
use crate::transport::LineEnding;

/// Brocade VDX 67xx running Network OS.
pub fn vdx() -> Dialect {
    Dialect::new("brocade_vdx", "Brocade", "vdx_67xx", "#")
        .with_error_mark("(?:syntax error:) ")
        .with_config_term_cmd("terminal length 0")
        .with_line_ending(LineEnding::Lf)
}

/// Brocade NetIron (MLX/CES) chassis.
pub fn netiron() -> Dialect {
    Dialect::new("brocade_netiron", "Brocade", "netiron", "#")
        .with_error_mark("(?:Error:|Invalid input ->) ")
        .with_config_term_cmd("terminal length 0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ErrorMark;

    #[test]
    fn test_vdx_dialect() {
        let dialect = vdx();
        assert_eq!(dialect.line_ending, LineEnding::Lf);
        assert_eq!(dialect.config_term_cmd.as_deref(), Some("terminal length 0"));
    }

    #[test]
    fn test_netiron_error_mark() {
        let mark = ErrorMark::new(netiron().error_mark.as_deref().unwrap()).unwrap();
        assert!(mark.find_message("Invalid input -> vlam 10").is_some());
        assert!(mark.find_message("Error: vlan 5000 out of range").is_some());
        assert!(mark.find_message("vlan 10 created").is_none());
    }
}
