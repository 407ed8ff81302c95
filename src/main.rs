use std::io::Write;

use clap::{Args, Parser, Subcommand};
use tracing::debug;

use kvdb_client::{
    create_bucket_with, AccessTokenOptions, AuthMode, BucketPolicy, Client, ClientConfig,
    CounterOptions, CreateBucketOptions, GetOptions, HyperTransport, ListOptions, Payload,
    SetOptions, TransportConfig, TxnOp, Value, DEFAULT_BASE_URL,
};

#[derive(Parser)]
#[command(name = "kvdb", version, about = "Command-line client for KVdb buckets")]
struct Cli {
    #[command(flatten)]
    conn: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ConnectionArgs {
    #[arg(long, global = true, env = "KVDB_BUCKET", help = "Bucket id")]
    bucket: Option<String>,
    #[arg(long, global = true, env = "KVDB_TOKEN", hide_env_values = true, help = "Access token or bucket key")]
    token: Option<String>,
    #[arg(long, global = true, env = "KVDB_AUTH_TYPE", default_value = "basic", help = "Auth mode: basic|bearer|query")]
    auth: AuthMode,
    #[arg(long, global = true, env = "KVDB_BASE_URL", default_value = DEFAULT_BASE_URL, help = "Service endpoint")]
    base_url: String,
}

#[derive(Args)]
struct WriteArgs {
    #[arg(help = "Key")]
    key: String,
    #[arg(help = "Value; parsed as JSON with --json")]
    value: String,
    #[arg(long, help = "Send the value as JSON")]
    json: bool,
    #[arg(long, help = "Explicit content-type")]
    content_type: Option<String>,
    #[arg(long, help = "Seconds until the key expires")]
    ttl: Option<u64>,
}

#[derive(Args)]
struct CounterArgs {
    #[arg(help = "Key")]
    key: String,
    #[arg(default_value_t = 1, allow_negative_numbers = true, help = "Amount")]
    amount: i64,
    #[arg(long, help = "Seconds until the key expires")]
    ttl: Option<u64>,
}

#[derive(Args)]
struct PolicyArgs {
    #[arg(long)]
    secret_key: Option<String>,
    #[arg(long)]
    write_key: Option<String>,
    #[arg(long)]
    read_key: Option<String>,
    #[arg(long)]
    signing_key: Option<String>,
    #[arg(long, help = "Default ttl in seconds for new keys")]
    default_ttl: Option<u64>,
}

impl From<PolicyArgs> for BucketPolicy {
    fn from(args: PolicyArgs) -> Self {
        BucketPolicy {
            secret_key: args.secret_key,
            write_key: args.write_key,
            read_key: args.read_key,
            signing_key: args.signing_key,
            default_ttl: args.default_ttl,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Read a key
    Get {
        key: String,
        #[arg(long, help = "Parse the value as JSON when possible")]
        json: bool,
    },
    /// Store a value (POST)
    Set(WriteArgs),
    /// Update a value (PATCH)
    Update(WriteArgs),
    /// Add to a counter
    Incr(CounterArgs),
    /// Subtract from a counter
    Decr(CounterArgs),
    /// Delete a key
    Delete { key: String },
    /// List keys
    List {
        #[arg(long, help = "Include values")]
        values: bool,
        #[arg(long, default_value = "json")]
        format: String,
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long)]
        skip: Option<u64>,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        reverse: bool,
    },
    /// Apply a JSON array of {"set","value","ttl"} / {"delete"} operations atomically
    Txn { ops: String },
    /// Create an access token
    Token {
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long, help = "e.g. read,write")]
        permissions: Option<String>,
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Update the bucket policy
    Policy(PolicyArgs),
    /// Delete the bucket
    DropBucket,
    /// Create a new bucket and print its id
    CreateBucket {
        email: String,
        #[command(flatten)]
        policy: PolicyArgs,
    },
}

fn print_payload(payload: &Payload) -> Result<(), Box<dyn std::error::Error>> {
    match payload {
        Payload::Json(v) => println!("{}", serde_json::to_string_pretty(v)?),
        Payload::Text(s) if s.is_empty() => {}
        Payload::Text(s) => println!("{}", s),
        Payload::Binary(b) => std::io::stdout().write_all(b)?,
    }
    Ok(())
}

fn write_request(args: WriteArgs) -> Result<(String, Value, SetOptions), Box<dyn std::error::Error>> {
    let value = if args.json {
        Value::Json(serde_json::from_str(&args.value)?)
    } else {
        Value::Text(args.value)
    };
    let options = SetOptions {
        json: args.json,
        content_type: args.content_type,
        ttl: args.ttl,
    };
    Ok((args.key, value, options))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let Cli { conn, command } = Cli::parse();
    let transport = HyperTransport::with_config(TransportConfig::from_env())?;

    let mut config = ClientConfig::new(conn.bucket.unwrap_or_default())
        .with_auth_mode(conn.auth)
        .with_base_url(conn.base_url.clone());
    config.token = conn.token;
    debug!("Using bucket '{}' at {}", config.bucket, config.base_url);

    // built per command so create-bucket works without a bucket id
    let client = Client::with_transport(config, transport.clone());

    let payload = match command {
        Command::Get { key, json } => client?.get(&key, &GetOptions { parse_json: json }).await?,
        Command::Set(args) => {
            let (key, value, options) = write_request(args)?;
            client?.set(&key, value, &options).await?
        }
        Command::Update(args) => {
            let (key, value, options) = write_request(args)?;
            client?.update(&key, value, &options).await?
        }
        Command::Incr(args) => {
            client?
                .increment(&args.key, args.amount, &CounterOptions { ttl: args.ttl })
                .await?
        }
        Command::Decr(args) => {
            client?
                .decrement(&args.key, args.amount, &CounterOptions { ttl: args.ttl })
                .await?
        }
        Command::Delete { key } => client?.delete(&key).await?,
        Command::List {
            values,
            format,
            limit,
            skip,
            prefix,
            reverse,
        } => {
            let options = ListOptions {
                values,
                format: Some(format),
                limit,
                skip,
                prefix,
                reverse,
            };
            client?.list(&options).await?
        }
        Command::Txn { ops } => {
            let ops: Vec<TxnOp> = serde_json::from_str(&ops)?;
            client?.transaction(&ops).await?
        }
        Command::Token {
            prefix,
            permissions,
            ttl,
        } => {
            let options = AccessTokenOptions {
                prefix,
                permissions,
                ttl,
            };
            client?.create_access_token(&options).await?
        }
        Command::Policy(policy) => client?.update_bucket_policy(&policy.into()).await?,
        Command::DropBucket => client?.delete_bucket().await?,
        Command::CreateBucket { email, policy } => {
            let options = CreateBucketOptions {
                base_url: Some(conn.base_url),
                policy: policy.into(),
            };
            let bucket = create_bucket_with(&transport, &email, &options).await?;
            Payload::Text(bucket.trim().to_string())
        }
    };

    print_payload(&payload)
}
