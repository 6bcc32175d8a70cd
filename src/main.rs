fn main() -> anyhow::Result<()> {
    focusbar_lib::run()
}
