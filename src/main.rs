fn setup_environment() {
    std::env::remove_var("PYTHONHOME");
    std::env::remove_var("PYTHONPATH");
}

fn main() -> anyhow::Result<()> {
    setup_environment();
    vidqueue_lib::run()
}
