mod analysis;
mod app;
mod config;
mod entitlement;
mod payment;
mod profile;
mod providers;
mod state;
mod traits;
mod types;
mod units;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::app::{AppCore, AppEvent, ViewState};
use crate::entitlement::{BlockReason, EntitlementGate};
use crate::payment::{NoStorefront, PurchaseFlow};
use crate::profile::{NewPetDraft, ProfileBuilder};
use crate::providers::GoogleGenAiProvider;
use crate::state::SqliteStateStore;
use crate::traits::{SettingsStore, StateStore};
use crate::types::CheckInput;

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = PathBuf::from("pawfresh.toml");

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("status");

    match command {
        "--version" | "-V" => {
            println!("pawfresh {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        "--help" | "-h" => {
            println!("pawfresh {}", env!("CARGO_PKG_VERSION"));
            println!("{}\n", env!("CARGO_PKG_DESCRIPTION"));
            println!("Usage: pawfresh [COMMAND]\n");
            println!("Commands:");
            println!("  status                        Show account, pets and recent checks (default)");
            println!("  add-pet <name> <age> <weight> <photo>");
            println!("                                Create a pet profile from a photo");
            println!("  check <pet> <food>            Run a food-safety analysis for a named pet");
            println!("  reset                         Wipe all local data (fresh-install state)");
            println!("\nOptions:");
            println!("  -h, --help       Print help");
            println!("  -V, --version    Print version");
            return Ok(());
        }
        "status" | "add-pet" | "check" | "reset" => {}
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Run `pawfresh --help` for usage.");
            std::process::exit(1);
        }
    }

    let config = config::AppConfig::load(&config_path)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config, command, &args[2..]))
}

async fn run(config: config::AppConfig, command: &str, args: &[String]) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStateStore::new(&config.state.db_path).await?);

    match command {
        "status" => {
            if !store.has_onboarded().await? {
                store.complete_onboarding().await?;
            }
            status(&config, store.as_ref()).await
        }
        "add-pet" => {
            let (name, age, weight, photo) =
                match (args.first(), args.get(1), args.get(2), args.get(3)) {
                    (Some(name), Some(age), Some(weight), Some(photo)) => (name, age, weight, photo),
                    _ => {
                        eprintln!("Usage: pawfresh add-pet <name> <age> <weight> <photo>");
                        std::process::exit(1);
                    }
                };
            let age: f64 = age.parse().map_err(|_| {
                anyhow::anyhow!("age must be a number of years, got '{}'", age)
            })?;
            let weight: f64 = weight.parse().map_err(|_| {
                anyhow::anyhow!("weight must be a number, got '{}'", weight)
            })?;
            let photo = std::fs::read(photo)
                .map_err(|e| anyhow::anyhow!("cannot read photo '{}': {}", photo, e))?;

            let mut core = build_core(&config, store.clone())?;
            core.start().await?;
            add_pet(&mut core, store.as_ref(), name, age, weight, photo, &config).await
        }
        "check" => {
            let (pet_name, food) = match (args.first(), args.get(1)) {
                (Some(pet), Some(food)) => (pet.as_str(), food.as_str()),
                _ => {
                    eprintln!("Usage: pawfresh check <pet> <food>");
                    std::process::exit(1);
                }
            };

            let mut core = build_core(&config, store.clone())?;
            core.start().await?;
            check(&mut core, store.as_ref(), pet_name, food).await
        }
        "reset" => {
            store.clear_all().await?;
            println!("All local data cleared.");
            Ok(())
        }
        _ => unreachable!("commands are validated before the runtime starts"),
    }
}

fn build_core(
    config: &config::AppConfig,
    store: Arc<SqliteStateStore>,
) -> anyhow::Result<AppCore> {
    let provider = Arc::new(GoogleGenAiProvider::new(
        &config.provider.api_key,
        Some(&config.provider.base_url),
        &config.provider.reasoning_model,
        &config.provider.image_model,
    )?);
    let gate = EntitlementGate::new(store.clone());

    Ok(AppCore::new(
        store.clone(),
        ProfileBuilder::new(provider.clone()),
        analysis::AnalysisOrchestrator::new(
            store,
            provider,
            gate.clone(),
            config.locale.language,
            config.locale.unit_system,
        ),
        PurchaseFlow::new(Arc::new(NoStorefront), gate.clone()),
        gate,
    ))
}

async fn status(config: &config::AppConfig, store: &dyn StateStore) -> anyhow::Result<()> {
    let units = config.locale.unit_system;

    println!("pawfresh {}", env!("CARGO_PKG_VERSION"));
    println!(
        "Account: {}",
        if store.is_entitled().await? {
            "Pro".to_string()
        } else {
            format!("free ({} credits left)", store.free_credits().await?)
        }
    );

    let pets = store.list_pets().await;
    if pets.is_empty() {
        println!("\nNo pets yet.");
    } else {
        println!("\nPets:");
        for pet in &pets {
            println!(
                "  {} — {}{}, {:.1} y, {:.1} {}",
                pet.name,
                pet.species,
                pet.breed
                    .as_deref()
                    .map(|b| format!(" ({})", b))
                    .unwrap_or_default(),
                pet.age,
                units.display_weight(pet.weight_kg),
                units.weight_label(),
            );
        }
    }

    let checks = store.list_checks().await;
    if !checks.is_empty() {
        println!("\nRecent checks:");
        for check in checks.iter().take(10) {
            println!(
                "  {}  {:<20} {}",
                check.created_at.format("%Y-%m-%d %H:%M"),
                check.food_name,
                check.verdict.risk_level,
            );
        }
    }

    Ok(())
}

async fn add_pet(
    core: &mut AppCore,
    store: &dyn StateStore,
    name: &str,
    age: f64,
    display_weight: f64,
    photo: Vec<u8>,
    config: &config::AppConfig,
) -> anyhow::Result<()> {
    core.handle(AppEvent::AddPetRequested).await;
    if let ViewState::Paywall { reason, .. } = core.view() {
        eprintln!("{}", paywall_message(*reason));
        std::process::exit(1);
    }

    core.handle(AppEvent::PetSubmitted(NewPetDraft {
        name: name.to_string(),
        age,
        weight_kg: config.locale.unit_system.weight_to_kg(display_weight),
        notes: None,
        allergies: vec![],
        conditions: vec![],
        photo,
    }))
    .await;

    if let Some(notice) = core.take_notice() {
        eprintln!("{}", notice);
        std::process::exit(1);
    }

    let pets = store.list_pets().await;
    let Some(pet) = pets.iter().find(|p| p.name == name) else {
        anyhow::bail!("profile was not saved");
    };
    println!(
        "Added {} — {}{}.",
        pet.name,
        pet.species,
        pet.breed
            .as_deref()
            .map(|b| format!(" ({})", b))
            .unwrap_or_default(),
    );
    Ok(())
}

async fn check(
    core: &mut AppCore,
    store: &dyn StateStore,
    pet_name: &str,
    food: &str,
) -> anyhow::Result<()> {
    let Some(pet) = store
        .list_pets()
        .await
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(pet_name))
    else {
        eprintln!("No pet named '{}'.", pet_name);
        std::process::exit(1);
    };

    core.handle(AppEvent::CheckRequested {
        pet_id: pet.id.clone(),
    })
    .await;
    if let ViewState::Paywall { reason, .. } = core.view() {
        eprintln!("{}", paywall_message(*reason));
        std::process::exit(1);
    }

    core.handle(AppEvent::CheckSubmitted(CheckInput::Lookup(
        food.to_string(),
    )))
    .await;

    let ViewState::CheckResult { check_id } = core.view() else {
        let notice = core
            .take_notice()
            .unwrap_or_else(|| "The analysis failed. Please try again.".to_string());
        eprintln!("{}", notice);
        std::process::exit(1);
    };
    let check_id = check_id.clone();

    let checks = store.list_checks().await;
    let Some(record) = checks.iter().find(|c| c.id == check_id) else {
        anyhow::bail!("saved check {} not found", check_id);
    };

    let v = &record.verdict;
    println!("{} — {}", v.detected_food_name, v.risk_level);
    println!("{}", v.short_summary);
    println!("\n{}", v.detailed_explanation);
    if let Some(grams) = v.max_portion_grams {
        println!("\nMax portion: {:.0} g", grams);
    }
    if let Some(warning) = &v.emergency_warning {
        println!("\n⚠ {}", warning);
    }
    println!("\n{}", v.disclaimer);
    Ok(())
}

fn paywall_message(reason: BlockReason) -> &'static str {
    match reason {
        BlockReason::OutOfCredits => {
            "No free credits left. Upgrade to Pro to keep checking foods."
        }
        BlockReason::PetLimit => "Free accounts are limited to one pet profile.",
    }
}
