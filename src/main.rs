use std::path::Path;

use anyhow::Context;
use mail_merge_client::{
    configuration::get_configuration,
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber("mail-merge-client".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let spreadsheet = std::env::args()
        .nth(1)
        .context("usage: mail-merge-client <recipients.xlsx>")?;

    let configuration = get_configuration()?;

    let application = Application::build(configuration).await?;

    application.run(Path::new(&spreadsheet)).await
}
