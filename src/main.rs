#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let config = todomvc_server::config::Config::from_env()?;
    todomvc_server::web::start_web_server(config).await
}
