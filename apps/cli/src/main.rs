fn main() -> anyhow::Result<()> {
    bookdeck_cli::run()
}
