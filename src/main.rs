use perf_doctor::{app, clean_logger};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let res = app::run().await;
    if let Err(err) = res {
        clean_logger();
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
