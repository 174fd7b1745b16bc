use handsign::config::Config;

fn main() -> anyhow::Result<()> {
    handsign::init_logger!();

    let config = Config::from_env();
    log::debug!("{config:?}");
    handsign::gui::run(config)
}
