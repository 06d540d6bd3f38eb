use std::{io::BufRead, sync::OnceLock, time::Duration};

use rand::Rng;
use tokio::{sync::watch, time::Instant};

/// Random delay between `low` and `high` seconds, rounded to 0.1 s.
pub fn random_delay(low: f64, high: f64) -> Duration {
    let secs = if high > low {
        rand::thread_rng().gen_range(low..=high)
    } else {
        low
    };
    Duration::from_secs_f64((secs * 10.0).round() / 10.0)
}

/// Human-like pause between browser actions.
pub async fn pause(low: f64, high: f64) {
    tokio::time::sleep(random_delay(low, high)).await;
}

static ENTER_PRESSES: OnceLock<watch::Receiver<u64>> = OnceLock::new();

/// Counter of Enter presses, fed by one stdin reader thread for the whole process.
fn enter_presses() -> watch::Receiver<u64> {
    ENTER_PRESSES
        .get_or_init(|| {
            let (tx, rx) = watch::channel(0);
            let spawned = std::thread::Builder::new()
                .name("stdin-reader".to_string())
                .spawn(move || {
                    for line in std::io::stdin().lock().lines() {
                        if line.is_err() {
                            break;
                        }
                        tx.send_modify(|presses| *presses += 1);
                    }
                    log::debug!("stdin closed, waits can no longer be interrupted");
                });
            if let Err(e) = spawned {
                log::warn!("Could not start the stdin reader: {}", e);
            }
            rx
        })
        .clone()
}

/// Sleeps for `duration` unless the user presses Enter first.
/// Returns `true` if the wait was interrupted.
pub async fn interruptible_sleep(duration: Duration) -> bool {
    if duration.is_zero() {
        return false;
    }

    println!(
        "Waiting {} min {} s. Press Enter to stop waiting.",
        duration.as_secs() / 60,
        duration.as_secs() % 60
    );
    sleep_or_signal(duration, enter_presses()).await
}

/// Sleeps for `duration` or until `presses` changes. Presses made before the call are ignored.
async fn sleep_or_signal(duration: Duration, mut presses: watch::Receiver<u64>) -> bool {
    presses.borrow_and_update();
    let deadline = Instant::now() + duration;
    tokio::select! {
        _ = tokio::time::sleep_until(deadline) => {
            log::debug!("Waited {:?}", duration);
            false
        }
        changed = presses.changed() => {
            if changed.is_ok() {
                log::debug!("Wait interrupted by the user");
                true
            } else {
                // closed stdin cannot interrupt
                tokio::time::sleep_until(deadline).await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{sync::watch, time::Instant};

    use super::{interruptible_sleep, random_delay, sleep_or_signal};

    #[test]
    fn delay_stays_in_range() {
        for _ in 0..100 {
            let delay = random_delay(1.0, 2.0);
            assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(2));
        }
    }

    #[test]
    fn empty_range_uses_lower_bound() {
        assert_eq!(random_delay(3.0, 3.0), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn zero_sleep_returns_immediately() {
        assert!(!interruptible_sleep(Duration::ZERO).await);
    }

    #[tokio::test]
    async fn enter_press_ends_the_wait() {
        let (tx, rx) = watch::channel(0u64);
        let started = Instant::now();
        let wait = tokio::spawn(sleep_or_signal(Duration::from_secs(30), rx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send_modify(|presses| *presses += 1);

        assert!(wait.await.unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn each_wait_gets_its_own_press() {
        let (tx, rx) = watch::channel(0u64);

        assert!(!sleep_or_signal(Duration::from_millis(20), rx.clone()).await);

        let second = tokio::spawn(sleep_or_signal(Duration::from_secs(30), rx.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send_modify(|presses| *presses += 1);
        assert!(second.await.unwrap());
    }

    #[tokio::test]
    async fn earlier_presses_do_not_end_a_new_wait() {
        let (tx, rx) = watch::channel(0u64);
        tx.send_modify(|presses| *presses += 1);

        assert!(!sleep_or_signal(Duration::from_millis(30), rx).await);
    }

    #[tokio::test]
    async fn closed_input_waits_the_full_duration() {
        let (tx, rx) = watch::channel(0u64);
        drop(tx);
        let started = Instant::now();

        assert!(!sleep_or_signal(Duration::from_millis(50), rx).await);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
