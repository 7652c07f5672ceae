//! HP dialects.

use crate::platform::Dialect;

/// HP Virtual Connect Flex-10 modules. The VC CLI does not page, so there
/// is no terminal setup command.
pub fn flex10() -> Dialect {
    Dialect::new("hp_flex10", "HP", "virtual_connect_flex10", "->").with_error_mark("ERROR: ")
}
