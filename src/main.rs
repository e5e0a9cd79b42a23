#[tokio::main]
async fn main() {
    if let Err(e) = region_cast_lib::run().await {
        log::error!("Region-Cast failed: {}", e);
        eprintln!("region-cast: {}", e);
        std::process::exit(1);
    }
}
