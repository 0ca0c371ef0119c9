//! Command-line arguments for the server binary.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "tombola", about = "Numbered-lottery web backend")]
pub struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// MongoDB connection string
    #[arg(long, env = "DB_URI")]
    pub db_uri: String,

    /// Database name
    #[arg(long, env = "DB_NAME", default_value = "lottery")]
    pub db_name: String,
}
