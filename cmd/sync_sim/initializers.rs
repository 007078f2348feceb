use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::Directive, fmt, layer::SubscriberExt,
};

use crate::cli::Options;

/// Installs the global subscriber, `RUST_LOG` directives take precedence over `--log.level`
pub fn init_tracing(opts: &Options) -> eyre::Result<()> {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let fmt_layer = fmt::layer().with_filter(log_filter);
    tracing::subscriber::set_global_default(Registry::default().with(fmt_layer))?;

    Ok(())
}
