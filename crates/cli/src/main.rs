//! Interactive key management and offline SECURE_DATA decryption.
//!
//! Auxiliary tooling, never part of the logging hot path: generates SM2
//! key pairs for deployment and recovers the original values from emitted
//! envelopes given the matching private key.

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use securelog_core::{
    config::{self, ConfigBuilder},
    crypto, envelope, Sm2Transformation, Sm4Mode,
};
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const DECRYPT_OUTPUT_FILE: &str = "sm2_decrypt_output.txt";

#[derive(Parser, Debug)]
#[command(
    name = "securelog",
    about = "SecureLog key management and SECURE_DATA decrypter",
    version
)]
struct Args {
    /// Properties file to read cipher settings from (defaults to
    /// ./securelog-ecc.properties when present).
    #[arg(long, env = "SECURELOG_CONFIG")]
    config: Option<PathBuf>,
}

/// Cipher settings the tool needs; the public key is not required here.
struct CipherSettings {
    sm2_transformation: Sm2Transformation,
    sm4_mode: Sm4Mode,
    sm2_curve: String,
}

fn load_settings(args: &Args) -> Result<CipherSettings> {
    let mut builder = ConfigBuilder::new();
    builder = match &args.config {
        Some(path) => builder.load_file(path)?,
        None => builder.load_default_file()?,
    };
    // The decrypter and keygen run without a configured public key; feed a
    // placeholder so the snapshot builds, then use only the cipher fields.
    let snapshot = builder
        .set(config::PROP_PUBLIC_KEY, "-")
        .build()
        .context("invalid cipher configuration")?;
    Ok(CipherSettings {
        sm2_transformation: snapshot.sm2_transformation,
        sm4_mode: snapshot.sm4_mode,
        sm2_curve: snapshot.sm2_curve,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let settings = load_settings(&args)?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    println!("securelog interactive console");
    loop {
        println!();
        println!("commands: keygen | decrypt | exit");
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        match line?.trim().to_ascii_lowercase().as_str() {
            "keygen" => {
                if let Err(err) = run_keygen(&settings) {
                    eprintln!("keygen failed: {err:#}");
                }
            }
            "decrypt" => {
                if let Err(err) = run_decrypt(&settings, &mut lines) {
                    eprintln!("decrypt failed: {err:#}");
                }
            }
            "exit" | "quit" => break,
            "" => continue,
            other => println!("unknown command: {other}"),
        }
    }
    Ok(())
}

fn run_keygen(settings: &CipherSettings) -> Result<()> {
    if !settings.sm2_curve.eq_ignore_ascii_case("sm2p256v1") {
        bail!("unsupported curve: {}", settings.sm2_curve);
    }
    let material = crypto::generate_key_pair()?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

    let public_path = format!("sm2_public_key_{stamp}.txt");
    let private_path = format!("sm2_private_key_{stamp}.txt");
    let fingerprint_path = format!("sm2_fingerprint_{stamp}.txt");

    std::fs::write(&public_path, &material.public_key)
        .with_context(|| format!("writing {public_path}"))?;
    std::fs::write(&private_path, &material.private_key)
        .with_context(|| format!("writing {private_path}"))?;
    std::fs::write(&fingerprint_path, &material.fingerprint)
        .with_context(|| format!("writing {fingerprint_path}"))?;

    println!("public key  -> {public_path}");
    println!("private key -> {private_path}");
    println!("fingerprint -> {fingerprint_path} ({})", material.fingerprint);
    println!("keep the private key offline; only the public key goes into securelog-ecc.properties");
    Ok(())
}

fn run_decrypt(
    settings: &CipherSettings,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<()> {
    let secure_data = prompt(lines, "SECURE_DATA (Base64)")?;
    if secure_data.is_empty() {
        bail!("empty ciphertext");
    }
    let private_b64 = prompt(lines, "private key (Base64 PKCS#8)")?;

    let private = crypto::Sm2PrivateKey::from_base64_pkcs8(&private_b64, settings.sm2_transformation)?;
    let plaintext_bytes = envelope::open(&secure_data, &private, settings.sm4_mode)?;
    let plaintext = String::from_utf8_lossy(&plaintext_bytes).into_owned();

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(DECRYPT_OUTPUT_FILE)
        .with_context(|| format!("opening {DECRYPT_OUTPUT_FILE}"))?;
    writeln!(file, "{plaintext}")?;

    println!("{plaintext}");
    println!("(appended to {DECRYPT_OUTPUT_FILE})");
    Ok(())
}

fn prompt(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    label: &str,
) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(line?.trim().to_string()),
        None => bail!("input closed"),
    }
}
