use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = orch_api::Args::parse();

	orch_api::run(args).await
}
