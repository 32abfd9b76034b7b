use std::process::ExitCode;

fn main() -> ExitCode {
    match handle_cli_flags() {
        Ok(true) => return ExitCode::SUCCESS,
        Ok(false) => {}
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    }

    if let Err(err) = moviepedia::run() {
        eprintln!("error: {err:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn handle_cli_flags() -> anyhow::Result<bool> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut saw_flag = false;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Moviepedia {}", moviepedia::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "Moviepedia - Browse movies and TV shows from TMDB in the terminal.\n\n  --version, -V                   Show version and exit\n  --help,    -h                   Show this help message\n  --save-token TOKEN [ACCOUNT_ID] Store a TMDB read access token in the config file\n\nLogs: ~/.cache/moviepedia/moviepedia.log (filter with {})",
                    moviepedia::logging::LOG_ENV
                );
                saw_flag = true;
            }
            "--save-token" => {
                saw_flag = true;
                let Some(token) = iter.next() else {
                    anyhow::bail!("--save-token requires a TMDB access token");
                };
                let account_id = match iter.next() {
                    Some(raw) => Some(
                        raw.parse::<u64>()
                            .map_err(|_| anyhow::anyhow!("invalid account id: {raw}"))?,
                    ),
                    None => None,
                };
                let path = moviepedia::config::save_credentials(None, token, account_id)?;
                println!("Saved TMDB credentials to {}", path.display());
            }
            _ => {}
        }
    }
    Ok(saw_flag)
}
