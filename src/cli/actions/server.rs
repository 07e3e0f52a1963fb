use crate::{
    api,
    cli::telemetry,
    mail::{SmtpEmailSender, TransportStrategy},
    relay::Relay,
};
use anyhow::Result;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub form_data_dir: PathBuf,
    pub transport: TransportStrategy,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let sender = Arc::new(SmtpEmailSender::new(args.transport));
    let relay = Arc::new(Relay::new(args.form_data_dir, sender));

    let result = api::new(args.port, relay).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let primary = &args.transport.primary;
    info!(
        port = args.port,
        form_data_dir = %args.form_data_dir.display(),
        smtp_host = %primary.host,
        smtp_port = primary.port,
        failover = %args.transport.policy,
        "Starting taraftar"
    );
    debug!("Mail transport: {:?}", args.transport);
}
