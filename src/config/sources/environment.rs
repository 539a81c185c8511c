//! Environment source: AQUEUE__SECTION__KEY variables, e.g. AQUEUE__DEFAULTS__MAX_PARALLELISM=4

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const PREFIX: &str = "AQUEUE";
pub const SEPARATOR: &str = "__";

/// Add environment overrides to builder. Highest precedence, so add it last.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(PREFIX)
            .prefix_separator(SEPARATOR)
            .separator(SEPARATOR)
            .try_parsing(true),
    )
}
