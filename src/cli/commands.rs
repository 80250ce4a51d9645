//! CLI command implementations

use anyhow::{bail, Result};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::{
    IdentityClient, QuestionAgentClient, SessionAuthenticator, StatsFetcher, UsageReporter,
};
use crate::config::Config;
use crate::cycle::CycleOrchestrator;
use crate::net::{load_proxies, HttpPool, ProxyPool, RateLimitDetector, RateLimiter};
use crate::questions::QuestionBank;
use crate::wallet::{load_wallets, Account, LocalSigner, MessageSigner};

/// Shared clients built once per run
struct Services {
    http: Arc<HttpPool>,
    limiter: Arc<RateLimiter>,
    detector: RateLimitDetector,
    stats: Arc<StatsFetcher>,
}

impl Services {
    fn build(config: &Config) -> Result<Self> {
        let proxies = load_proxies(Path::new(&config.files.proxies));
        let http = Arc::new(HttpPool::new(&config.http, Arc::new(ProxyPool::new(proxies)))?);
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let detector = RateLimitDetector::new(&config.rate_limit.rate_limit_patterns)?;

        let identity = Arc::new(IdentityClient::new(
            http.clone(),
            &config.endpoints.identity_base_url,
            &config.rate_limit,
        ));
        let auth = Arc::new(SessionAuthenticator::new(identity.clone(), config.auth.clone()));
        let stats = Arc::new(StatsFetcher::new(identity, auth));

        Ok(Self {
            http,
            limiter,
            detector,
            stats,
        })
    }
}

/// Load wallets and pair each with its signer; wallets with unusable keys are skipped
fn load_accounts(config: &Config) -> Result<Vec<Account>> {
    let wallets = load_wallets(Path::new(&config.files.wallets))?;

    let mut accounts = Vec::with_capacity(wallets.len());
    for wallet in wallets {
        let short = wallet.short_address();
        match Account::from_wallet(wallet) {
            Ok(account) => accounts.push(account),
            Err(e) => error!("[{}] Skipping wallet {}: {}", e.category(), short, e),
        }
    }

    if accounts.is_empty() {
        bail!("No usable wallets found in {}", config.files.wallets);
    }
    Ok(accounts)
}

/// Run the question/report loop until Ctrl-C
pub async fn start(config: &Config) -> Result<()> {
    info!("Starting KiteAI agent bot...");

    let accounts = load_accounts(config)?;
    info!("Loaded {} wallets", accounts.len());

    let services = Services::build(config)?;
    let agents = Arc::new(QuestionAgentClient::new(
        services.http.clone(),
        services.limiter.clone(),
        services.detector.clone(),
        &config.endpoints.agent_url_template,
    ));
    let usage = Arc::new(
        UsageReporter::new(
            services.http.clone(),
            services.limiter.clone(),
            services.detector.clone(),
            &config.endpoints.usage_url,
            config.rate_limit.max_retries,
        )
        .with_stats(services.stats.clone()),
    );
    let questions = Arc::new(QuestionBank::from_config(&config.questions));

    let cancel = CancellationToken::new();
    let orchestrator = CycleOrchestrator::new(
        accounts,
        config.agents.clone(),
        agents,
        usage,
        questions,
        config.rate_limit.interval_between_cycles(),
        cancel.clone(),
    );

    // first Ctrl-C lets the current step finish, a second one exits at once
    let done = CancellationToken::new();
    let watcher = {
        let (cancel, done) = (cancel.clone(), done.clone());
        tokio::spawn(async move {
            if wait_for_interrupts(tokio::signal::ctrl_c, &cancel, &done).await
                == Interrupt::Forced
            {
                std::process::exit(0);
            }
        })
    };

    let cycles = orchestrator.run().await;
    done.cancel();
    let _ = watcher.await;

    info!("Bot stopped after {} cycles", cycles);
    Ok(())
}

/// How the interrupt watcher ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// The loop finished without a signal
    None,
    /// One signal; the loop was asked to stop after its current step
    Graceful,
    /// A second signal arrived before the loop stopped
    Forced,
}

/// Cancel `cancel` on the first interrupt and keep listening until `done`;
/// a second interrupt in that window reports `Forced`.
async fn wait_for_interrupts<F, Fut>(
    mut interrupt: F,
    cancel: &CancellationToken,
    done: &CancellationToken,
) -> Interrupt
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = interrupt() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
                done.cancelled().await;
                return Interrupt::None;
            }
            warn!("Received Ctrl-C, stopping after the current step (again to exit now)...");
            cancel.cancel();
        }
        _ = done.cancelled() => return Interrupt::None,
    }

    tokio::select! {
        result = interrupt() => match result {
            Ok(()) => {
                warn!("Received second Ctrl-C, exiting now");
                Interrupt::Forced
            }
            Err(_) => {
                done.cancelled().await;
                Interrupt::Graceful
            }
        },
        _ = done.cancelled() => Interrupt::Graceful,
    }
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// List loaded wallets and whether each key signs for its address
pub fn wallets(config: &Config) -> Result<()> {
    let wallets = load_wallets(Path::new(&config.files.wallets))?;

    println!("\n=== WALLETS ({}) ===\n", config.files.wallets);
    println!("{:<44} {}", "ADDRESS", "KEY");
    println!("{}", "-".repeat(60));

    for wallet in &wallets {
        let key = match LocalSigner::from_wallet(wallet) {
            Ok(signer) if signer.matches(wallet) => "ok".to_string(),
            Ok(signer) => format!("mismatch (derives {})", signer.address()),
            Err(e) => format!("invalid ({})", e),
        };
        println!("{:<44} {}", wallet.address(), key);
    }

    println!("\n{} wallets\n", wallets.len());
    Ok(())
}

/// List parsed proxies (credentials hidden)
pub fn proxies(config: &Config) -> Result<()> {
    let proxies = load_proxies(Path::new(&config.files.proxies));

    println!("\n=== PROXIES ({}) ===\n", config.files.proxies);
    if proxies.is_empty() {
        println!("No proxies configured; requests go out directly.");
    }
    for (i, proxy) in proxies.iter().enumerate() {
        let auth = if proxy.auth.is_some() { " (auth)" } else { "" };
        println!("{:>3}. {}{}", i + 1, proxy, auth);
    }

    println!();
    Ok(())
}

/// Log in each wallet once and print its stats
pub async fn stats(config: &Config) -> Result<()> {
    let accounts = load_accounts(config)?;
    let services = Services::build(config)?;

    for account in &accounts {
        let stats = services.stats.stats_or_default(account).await;
        println!("{}", stats.summary());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::time::Duration;
    use tokio::sync::Notify;

    type Signal = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

    fn signals(notify: &Arc<Notify>) -> impl FnMut() -> Signal {
        let notify = notify.clone();
        move || {
            let notify = notify.clone();
            Box::pin(async move {
                notify.notified().await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_loop_finishing_ends_watcher_quietly() {
        let notify = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        done.cancel();

        let outcome = wait_for_interrupts(signals(&notify), &cancel, &done).await;
        assert_eq!(outcome, Interrupt::None);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_first_interrupt_cancels_and_waits_for_loop() {
        let notify = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();

        let watcher = {
            let (notify, cancel, done) = (notify.clone(), cancel.clone(), done.clone());
            tokio::spawn(async move { wait_for_interrupts(signals(&notify), &cancel, &done).await })
        };

        notify.notify_one();
        tokio::time::timeout(Duration::from_secs(1), cancel.cancelled())
            .await
            .unwrap();
        assert!(!watcher.is_finished());

        done.cancel();
        assert_eq!(watcher.await.unwrap(), Interrupt::Graceful);
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        let notify = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();

        let watcher = {
            let (notify, cancel, done) = (notify.clone(), cancel.clone(), done.clone());
            tokio::spawn(async move { wait_for_interrupts(signals(&notify), &cancel, &done).await })
        };

        notify.notify_one();
        tokio::time::timeout(Duration::from_secs(1), cancel.cancelled())
            .await
            .unwrap();
        notify.notify_one();

        let outcome = tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Interrupt::Forced);
        assert!(!done.is_cancelled());
    }
}
