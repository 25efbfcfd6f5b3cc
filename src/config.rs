//! The structures and functions for configuration. Must be accessible to main.

/// The overall options.
pub struct BibConfig<'a> {
    pub command: BibCommand,
    pub output: Option<Output>,
    pub parse_config: Option<ParseConfig<'a>>,
}

impl BibConfig<'_> {
    pub fn new<'a>(
        command: BibCommand,
        output: Option<Output>,
        parse_config: Option<ParseConfig<'a>>,
    ) -> BibConfig<'a> {
        BibConfig {
            command,
            output,
            parse_config,
        }
    }
}

/// The types of subcommands.
pub enum BibCommand {
    Main,
    NewMacroFile,
}

/// Output options.
#[derive(PartialEq, Eq, Debug)]
pub enum Output {
    StandardOut,
    Json,
}

/// Parser configuration.
pub struct ParseConfig<'a> {
    pub input: &'a str,
    pub output: Option<&'a str>,
    pub macros: Option<&'a str>,
    pub pretty: bool,
}

impl ParseConfig<'_> {
    pub fn new<'a>(
        input: &'a str,
        output: Option<&'a str>,
        macros: Option<&'a str>,
        pretty: bool,
    ) -> ParseConfig<'a> {
        ParseConfig {
            input,
            output,
            macros,
            pretty,
        }
    }
}
