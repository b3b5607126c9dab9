//! `rbe-site`: command-line walk through the public site
//!
//! ```text
//! rbe-site events
//! rbe-site event <id>
//! rbe-site register <id> <name> <email> <adults> <children>
//! rbe-site subscribe <email>
//! rbe-site flashes
//! rbe-site vehicles [id]
//! rbe-site changelog
//! rbe-site contact <name> <email> <subject> <message>
//! ```
//!
//! Configuration comes from the environment (and `.env`), see
//! [`rbe_site::config::Config`].

use rbe_client::SiteClient;
use rbe_core::environment::{Clock, SystemClock};
use rbe_runtime::Store;
use rbe_site::api::SiteApi;
use rbe_site::changelog::load_changelog;
use rbe_site::config::Config;
use rbe_site::contact::{ContactForm, EmailJsMailer, send_contact_message};
use rbe_site::events::{FallbackQuery, load_catalog};
use rbe_site::flashes::{
    FileDismissedStore, FlashBannerAction, FlashBannerEnvironment, FlashBannerReducer,
    FlashBannerState,
};
use rbe_site::newsletter::{
    NewsletterAction, NewsletterEnvironment, NewsletterReducer, NewsletterState,
};
use rbe_site::registration::{
    LogRedirector, RegistrationAction, RegistrationEnvironment, RegistrationSettings,
    RegistrationState, RegistrationStore, Step, fetch_event, registration_store,
};
use rbe_site::site_config::SiteContext;
use rbe_site::vehicles::{list_vehicles, vehicle_detail};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: rbe-site <events | event <id> | register <id> <name> <email> <adults> <children> | subscribe <email> | flashes | vehicles [id] | changelog | contact <name> <email> <subject> <message>>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rbe_site=info,rbe_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let client = match config.api.http_timeout() {
        Some(timeout) => SiteClient::with_timeout(&config.api.url, timeout)?,
        None => SiteClient::new(&config.api.url)?,
    };
    let api: Arc<dyn SiteApi> = Arc::new(client);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let site = SiteContext::load(api.as_ref()).await;
    info!(site = %site.site_name, api = %config.api.url, "=== {} ===", site.tagline);
    if site.shows_maintenance() {
        println!("{}", site.maintenance_message);
        return Ok(());
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["events"] => events(api.as_ref(), clock.as_ref()).await,
        ["event", id] => event(api.as_ref(), clock.as_ref(), id).await,
        ["register", id, name, email, adults, children] => {
            let settings = RegistrationSettings::from(&config.registration);
            let env = RegistrationEnvironment::new(api, Arc::new(LogRedirector), clock, settings);
            register(env, id, name, email, adults.parse()?, children.parse()?).await
        },
        ["subscribe", email] => subscribe(api, email).await,
        ["flashes"] => {
            let env = FlashBannerEnvironment::new(
                api,
                Arc::new(FileDismissedStore::new(&config.flashes.dismissed_path)),
                Arc::clone(&clock),
                config.flashes.refresh_interval(),
            );
            flashes(env, clock.as_ref()).await
        },
        ["vehicles"] => {
            let fleet = list_vehicles(api.as_ref()).await;
            warn_if_demo(fleet.is_fallback());
            for vehicle in &fleet.value {
                println!("#{:<6} {}", vehicle.id(), vehicle.title());
            }
            Ok(())
        },
        ["vehicles", id] => {
            let detail = vehicle_detail(api.as_ref(), id).await?;
            println!("{}", detail.vehicle.title());
            for (label, value) in detail.vehicle.characteristics() {
                println!("  {label}: {value}");
            }
            for url in detail.vehicle.hero_candidates(&config.api.url) {
                println!("  image: {url}");
            }
            for event in &detail.events {
                println!("  {} {}", event.date, event.title);
            }
            Ok(())
        },
        ["changelog"] => {
            for entry in load_changelog(api.as_ref()).await? {
                println!("{} ({}) {}", entry.version, entry.date, entry.title);
                for change in &entry.changes {
                    println!("  - {change}");
                }
            }
            Ok(())
        },
        ["contact", name, email, subject, message] => {
            let mailer = EmailJsMailer::from_config(&config.contact)?;
            let form = ContactForm {
                name: (*name).to_string(),
                email: (*email).to_string(),
                subject: (*subject).to_string(),
                message: (*message).to_string(),
            };
            send_contact_message(&mailer, &form, &config.contact.recipient).await?;
            println!("Message sent.");
            Ok(())
        },
        _ => {
            eprintln!("{USAGE}");
            Ok(())
        },
    }
}

fn warn_if_demo(fallback: bool) {
    if fallback {
        println!("(API unreachable, showing demo data)");
    }
}

async fn events(api: &dyn SiteApi, clock: &dyn Clock) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = load_catalog(api).await;
    warn_if_demo(catalog.is_fallback());

    let now = clock.now();
    for event in &catalog.value {
        let button = event.registration_button(now);
        println!("{} {:<40} [{}]", event.date, event.title, button.label());
        println!("    /events/{}/register?{}", event.id, event.registration_query());
    }
    Ok(())
}

async fn event(
    api: &dyn SiteApi,
    clock: &dyn Clock,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = fetch_event(api, id, &FallbackQuery::default()).await?;
    warn_if_demo(loaded.is_fallback());

    let event = loaded.value;
    println!("{} on {}", event.title, event.date);
    if let Some(location) = &event.location {
        println!("Location: {location}");
    }
    if let Some(description) = &event.description {
        println!("{description}");
    }
    if let Some(price) = event.adult_price {
        println!("Adult: {price}");
    }
    if let Some(price) = event.child_price {
        println!("Child: {price}");
    }
    println!("[{}]", event.registration_button(clock.now()).label());
    Ok(())
}

async fn register(
    env: RegistrationEnvironment,
    id: &str,
    name: &str,
    email: &str,
    adults: u32,
    children: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let qr_service_url = env.settings.qr_service_url.clone();
    let store = registration_store(RegistrationState::new(id, FallbackQuery::default()), env);

    store.send(RegistrationAction::Load).await?.wait().await;
    if let Step::Unavailable(error) = store.state(|s| s.step.clone()).await {
        return Err(error.into());
    }

    for action in [
        RegistrationAction::NameChanged(name.to_string()),
        RegistrationAction::EmailChanged(email.to_string()),
        RegistrationAction::AdultTicketsChanged(adults),
        RegistrationAction::ChildTicketsChanged(children),
    ] {
        store.send(action).await?;
    }

    let total = store.state(RegistrationState::total).await;
    info!(%total, "Submitting registration");
    store.send(RegistrationAction::Submit).await?.wait().await;

    if let Some(error) = store.state(|s| s.error.clone()).await {
        return Err(error.into());
    }

    println!("Registration received, waiting for validation (Ctrl-C to stop)...");
    tokio::select! {
        () = wait_for_outcome(&store) => {},
        _ = tokio::signal::ctrl_c() => {
            println!("Stopped waiting; the ticket will be sent by email.");
        },
    }
    let stopped = store.teardown();
    tracing::debug!(stopped, "Registration view closed");

    let (step, confirmation) = store.state(|s| (s.step.clone(), s.confirmation())).await;
    match (step, confirmation) {
        (Step::Success(ticket), Some(confirmation)) => {
            println!("{confirmation}");
            println!("Validation code: {}", ticket.validation_code());
            println!("QR code: {}", ticket.qr_code_url(&qr_service_url));
        },
        (Step::TimedOut, _) => {
            println!("Still not validated. Your ticket will be sent by email.");
        },
        _ => {},
    }
    Ok(())
}

async fn wait_for_outcome(store: &RegistrationStore) {
    while !store.state(RegistrationState::is_terminal).await {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

async fn subscribe(api: Arc<dyn SiteApi>, email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::new(
        NewsletterState::default(),
        NewsletterReducer,
        NewsletterEnvironment::new(api),
    );

    store
        .send(NewsletterAction::EmailChanged(email.to_string()))
        .await?;
    store.send(NewsletterAction::Submit).await?;

    while store.state(|s| s.submitting).await {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    if let Some(status) = store.state(|s| s.status.clone()).await {
        println!("{}", status.message());
    }
    store.teardown();
    Ok(())
}

async fn flashes(
    env: FlashBannerEnvironment,
    clock: &dyn Clock,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::new(FlashBannerState::default(), FlashBannerReducer, env);
    store.send(FlashBannerAction::Mount).await?;

    let attempted = tokio::time::timeout(Duration::from_secs(10), async {
        while !store.state(|s| s.attempted).await {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    store.teardown();

    if attempted.is_err() || !store.state(|s| s.loaded).await {
        println!("(flashes unavailable)");
        return Ok(());
    }

    let now = clock.now();
    let active = store
        .state(|s| {
            s.active(now)
                .into_iter()
                .map(|flash| format!("[{:?}] {}", flash.kind, flash.content))
                .collect::<Vec<_>>()
        })
        .await;
    for line in active {
        println!("{line}");
    }
    Ok(())
}
