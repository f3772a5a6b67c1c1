fn main() -> Result<(), Box<dyn std::error::Error>> {
    sqlnav_cli::run()
}
