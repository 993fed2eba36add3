use netvane_core::UiConnector;

/// UI connector for the command line.
///
/// The CLI hosts no plugin-contributed widgets, so the default no-op
/// removals are exactly right; registering it still exercises the same
/// teardown path a graphical shell would use.
#[derive(Debug)]
pub struct CliConnector;

impl UiConnector for CliConnector {
    fn name(&self) -> &str {
        "cli"
    }
}
