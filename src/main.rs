//! Removes duplicate reads from sorted single-end SAM files using the read
//! UMI and clip/strand corrected start positions.

use anyhow::Result;

mod app;
pub mod cigar;
pub mod io;
pub mod markdups;
pub mod metrics;
pub mod record;
pub mod whitelist;

use app::App;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let mut app = App::new().await?;
    app.run().await?;

    Ok(())
}
