use anyhow::{Result, bail};
use dialoguer::{Password, theme::ColorfulTheme};

use crate::crud::{DB, NewProviderConfig};
use crate::llm::{ProviderKind, Vault};
use crate::palette::Palette;
use crate::utils::{ask_yn, strip_controls_and_escapes, trim_line};

pub struct AddProvider {
    pub provider: ProviderKind,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub activate: bool,
}

pub async fn add(db: &DB, args: AddProvider) -> Result<()> {
    if !(0.0..=2.0).contains(&args.temperature) {
        bail!("Temperature must be between 0 and 2, got {}", args.temperature);
    }
    if args.max_tokens == 0 {
        bail!("Max tokens must be positive");
    }

    let (vault, source) = Vault::from_env()?;

    let api_key = match args.api_key {
        Some(key) => key,
        None => prompt_for_api_key(args.provider)?,
    };
    let Some(api_key) = trim_line(&api_key) else {
        bail!("No API key provided.");
    };

    let id = db
        .add_provider_config(&NewProviderConfig {
            provider: args.provider,
            encrypted_api_key: vault.encrypt(api_key)?,
            model: args.model,
            temperature: args.temperature,
            max_tokens: args.max_tokens,
            base_url: args.base_url,
        })
        .await?;
    println!(
        "Stored {} provider config {} (key encrypted with the vault secret from the {}).",
        args.provider,
        Palette::paint(Palette::ACCENT, id),
        source.description()
    );

    if args.activate {
        db.activate_provider_config(id).await?;
        println!("Provider config {id} is now active.");
    }
    Ok(())
}

fn prompt_for_api_key(provider: ProviderKind) -> Result<String> {
    println!(
        "{}",
        Palette::paint(Palette::SUCCESS, format!("Enter the {provider} API key"))
    );
    let raw = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("API Key")
        .allow_empty_password(true)
        .interact()?;
    Ok(strip_controls_and_escapes(&raw))
}

pub async fn list(db: &DB) -> Result<()> {
    let configs = db.list_provider_configs().await?;
    if configs.is_empty() {
        println!("No provider configs stored. Add one with `quizgen provider add`.");
        return Ok(());
    }

    for config in configs {
        let marker = if config.is_active {
            Palette::paint(Palette::SUCCESS, "*")
        } else {
            " ".to_string()
        };
        let last_used = config
            .last_used_at
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{marker} {:>3}  {:<10} {:<28} temp {:.1}  max {:>5}  used {:>4}  last {}",
            config.id,
            config.provider.as_str(),
            config.model,
            config.temperature,
            config.max_tokens,
            config.usage_count,
            last_used
        );
        if let Some(base_url) = config.base_url {
            println!("        {}", Palette::dim(base_url));
        }
    }
    Ok(())
}

pub async fn activate(db: &DB, id: i64) -> Result<()> {
    db.activate_provider_config(id).await?;
    println!("Provider config {} is now active.", Palette::paint(Palette::ACCENT, id));
    Ok(())
}

pub async fn remove(db: &DB, id: i64, yes: bool) -> Result<()> {
    if !yes && !ask_yn(format!("Remove provider config {id}?"))? {
        println!("Aborting; nothing removed.");
        return Ok(());
    }

    if db.remove_provider_config(id).await? {
        println!("Removed provider config {id}.");
    } else {
        println!("No provider config with id {id}.");
    }
    Ok(())
}
