fn main() -> anyhow::Result<()> {
    baht_won_lib::run()
}
