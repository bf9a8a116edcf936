//! TaskRelay CLI - calls a proxied endpoint and follows resumption redirects.

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION};
use reqwest::{Method, StatusCode, Url};

use taskrelay_core::REQUEST_ID_QUERY_PARAM;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// TaskRelay CLI - client for slow endpoints behind a TaskRelay proxy
#[derive(Parser)]
#[command(name = "taskrelay")]
#[command(about = "Client for endpoints behind a TaskRelay proxy", long_about = None)]
struct Cli {
    /// Give up after this many 303 resumptions
    #[arg(long, env = "TASKRELAY_MAX_RESUMPTIONS", default_value_t = 10, global = true)]
    max_resumptions: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a request and wait for its result
    Call {
        /// Target URL
        url: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,

        /// Extra header as `Name:Value`, repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },

    /// Rejoin a task that was started earlier
    Resume {
        /// URL of the original call
        url: String,

        /// Resumption identifier from a previous redirect
        request_id: String,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    match cli.command {
        Commands::Call {
            url,
            method,
            data,
            headers,
        } => {
            let url = Url::parse(&url)?;
            let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
            let headers = parse_headers(&headers)?;
            call(&client, url, method, headers, data, cli.max_resumptions).await?;
        }
        Commands::Resume { url, request_id } => {
            let url = resume_url(&url, &request_id)?;
            call(
                &client,
                url,
                Method::GET,
                HeaderMap::new(),
                None,
                cli.max_resumptions,
            )
            .await?;
        }
    }

    Ok(())
}

/// Send the request, then follow 303s with GET until an answer arrives.
async fn call(
    client: &reqwest::Client,
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: Option<String>,
    max_resumptions: u32,
) -> CliResult<()> {
    let mut request = client.request(method, url.clone()).headers(headers.clone());
    if let Some(body) = body {
        request = request.body(body);
    }
    let mut response = request.send().await?;
    let mut current = url;
    let mut resumptions = 0;

    while response.status() == StatusCode::SEE_OTHER {
        let location = response
            .headers()
            .get(LOCATION)
            .ok_or("303 response without a Location header")?
            .to_str()?;
        let next = current.join(location)?;

        if resumptions >= max_resumptions {
            return Err(format!(
                "Still pending after {resumptions} resumptions, resume later at {next}"
            )
            .into());
        }
        resumptions += 1;
        eprintln!("Pending, resuming at {next} ({resumptions}/{max_resumptions})");

        response = client.get(next.clone()).headers(headers.clone()).send().await?;
        current = next;
    }

    let status = response.status();
    let text = response.text().await?;
    println!("Status: {status}");
    println!("{text}");

    if status.is_client_error() || status.is_server_error() {
        return Err(format!("Request failed with status {status}").into());
    }
    Ok(())
}

/// Parse `Name:Value` header arguments.
fn parse_headers(raw: &[String]) -> CliResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for entry in raw {
        let (name, value) = entry
            .split_once(':')
            .ok_or_else(|| format!("Header must be Name:Value, got '{entry}'"))?;
        headers.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    Ok(headers)
}

/// The original URL with the resumption identifier attached.
fn resume_url(url: &str, request_id: &str) -> CliResult<Url> {
    let mut url = Url::parse(url)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != REQUEST_ID_QUERY_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(REQUEST_ID_QUERY_PARAM, request_id);
    Ok(url)
}
