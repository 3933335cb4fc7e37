use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use castloader_core::{Controller, ControllerConfig, DataSource, SeekType, select_seek_handler};
use castloader_transports::select_loader_factory;

mod logging;

/// Fetches a resource through the adaptive stash pipeline and writes the
/// bytes it receives straight to a file, to exercise the Controller end to
/// end from the command line.
#[derive(Parser, Debug)]
#[command(name = "castloader", version)]
struct Cli {
    /// URL of the resource to load.
    url: String,

    /// File to write the downloaded bytes to.
    #[arg(short, long, default_value = "out.bin")]
    output: String,

    /// Byte offset to start from.
    #[arg(long)]
    from: Option<u64>,

    /// Disable buffered (stash) delivery.
    #[arg(long)]
    no_stash: bool,

    /// Treat the resource as a live stream (disables early-EOF reconnect).
    #[arg(long)]
    live: bool,

    /// Initial stash window size, in bytes.
    #[arg(long, default_value_t = ControllerConfig::DEFAULT_STASH_INITIAL_SIZE)]
    stash_initial_size: usize,
}

#[tokio::main]
async fn main() {
    logging::init_logger();

    let cli = Cli::parse();

    let config = ControllerConfig {
        stash_initial_size: cli.stash_initial_size,
        enable_stash_buffer: !cli.no_stash,
        is_live: cli.live,
        seek_type: SeekType::Range,
        ..ControllerConfig::default()
    };

    let data_source = DataSource::new(cli.url.clone());
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .build()
        .expect("reqwest client configuration is static and valid");
    let seek_handler = select_seek_handler(&config, None).expect("default seek_type is always valid");

    let headers: Vec<(String, String)> = config
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let factory = select_loader_factory(
        &config,
        &data_source,
        None,
        client,
        seek_handler.clone(),
        headers,
    );

    log::info!("loading {} via a {:?} loader", cli.url, factory.loader_type());

    let controller = Controller::new(config, data_source, factory, seek_handler, ())
        .expect("config and data source were validated above");

    let output_path = cli.output.clone();
    let file = Arc::new(std::sync::Mutex::new(
        File::create(&output_path).expect("failed to create output file"),
    ));

    let done = Arc::new(tokio::sync::Notify::new());

    {
        let file = file.clone();
        controller.set_on_data_arrival(move |bytes, byte_start| {
            let mut file = file.lock().expect("output file mutex poisoned");
            log::debug!("received {} bytes at offset {byte_start}", bytes.len());
            file.write_all(bytes).expect("failed to write output file");
            bytes.len()
        });
    }

    {
        let done = done.clone();
        controller.set_on_complete(move |_extra_data| {
            log::info!("transfer complete");
            done.notify_one();
        });
    }

    {
        let done = done.clone();
        controller.set_on_error(move |kind, code, msg| {
            log::error!("loader error {kind:?} (code={code:?}): {msg}");
            done.notify_one();
        });
    }

    controller.set_on_redirect(|url| log::info!("redirected to {url}"));
    controller.set_on_recovered_early_eof(|| log::warn!("recovered from an early EOF"));

    controller
        .open(cli.from)
        .await
        .expect("on_data_arrival was bound above");

    tokio::select! {
        _ = done.notified() => {}
        _ = tokio::time::sleep(Duration::from_secs(300)) => {
            log::warn!("timed out waiting for completion");
        }
    }

    controller.destroy().await;
    log::info!("wrote output to {output_path}");
}
