//! Wall-clock-anchored synthetic content.
//!
//! Everything here is pure planning: the coordinator turns a config and an
//! RNG into [`ScheduledTask`]s, toasts and viewer-count steps. The session
//! registers the plan on its [`TaskGroup`](crate::scheduler::TaskGroup) and
//! applies the results when the timers fire.

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::message::NewMessage;
use crate::responder::TypingSource;

pub const WELCOME_MESSAGE: &str = "Welcome everyone! 👋 Thanks for joining today's live session. \
Drop your questions in the chat and I'll answer as many as I can.";

pub const ATTENDEE_NAMES: &[&str] = &[
    "Emma", "Liam", "Olivia", "Noah", "Ava", "James", "Sophia", "Lucas", "Mia", "Ethan",
    "Isabella", "Mason", "Harper", "Logan", "Amelia", "Jacob", "Ella", "Aiden", "Chloe", "Ryan",
];

pub const ATTENDEE_LINES: &[&str] = &[
    "Hi everyone! 👋",
    "Excited to be here!",
    "Hello from Toronto 🇨🇦",
    "Just joined, what did I miss?",
    "Good evening from London!",
    "Can't wait to learn more about this",
    "Hey all, first time here",
    "Greetings from Sydney 🌏",
    "Ready to take notes 📝",
    "This is going to be good",
    "Hi from Austin, Texas!",
    "Been looking forward to this all week",
    "Hello hello!",
    "Audio is crystal clear 👍",
    "Hi Sarah! Big fan of your work",
];

pub const INVESTOR_NAMES: &[&str] = &[
    "Michael R.", "Jennifer L.", "David K.", "Sarah M.", "Robert T.", "Linda W.", "James P.",
    "Patricia H.", "William S.", "Elizabeth B.",
];

pub const INVESTOR_CITIES: &[&str] = &[
    "New York", "Los Angeles", "Chicago", "Houston", "Miami", "Seattle", "Denver", "Boston",
];

pub const INVEST_AMOUNTS: &[u32] = &[500, 1_000, 2_500, 5_000, 10_000];

/// One row of the timed Q&A script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedQuestion {
    /// Seconds after mount.
    pub at_secs: u64,
    pub text: &'static str,
    pub name: &'static str,
}

const fn q(at_secs: u64, text: &'static str, name: &'static str) -> ScriptedQuestion {
    ScriptedQuestion { at_secs, text, name }
}

/// Attendee questions injected at fixed offsets regardless of user activity.
pub const QA_SCRIPT: &[ScriptedQuestion] = &[
    q(45, "Is this beginner friendly?", "Emma"),
    q(95, "How long does the setup usually take?", "Michael"),
    q(150, "Can I use this for my e-commerce store?", "Jessica"),
    q(210, "What kind of results are people seeing in the first month?", "Chris"),
    q(280, "Is there a money-back guarantee?", "Sophia"),
    q(340, "Do I need any technical skills for this?", "Daniel"),
    q(400, "How much time per week does this take?", "Olivia"),
    q(450, "Does this work with Zapier?", "David"),
    q(520, "Will the replay be available afterwards?", "Ashley"),
    q(600, "Is the special offer available internationally?", "Ryan"),
    q(690, "Can I pay in installments?", "Megan"),
    q(780, "What kind of support do we get after joining?", "Kevin"),
];

/// What a scheduled timer does when it fires.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    Post(NewMessage),
    TypingStart(TypingSource),
    TypingStop(TypingSource),
}

/// A timer planned relative to mount.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    pub fire_at: Duration,
    pub kind: TaskKind,
}

/// A transient "just invested" overlay. Not part of the chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub id: u64,
    pub text: String,
}

/// Draw a duration uniformly from `[min_ms, max_ms]`.
pub fn uniform_ms<R: Rng>(rng: &mut R, min_ms: u64, max_ms: u64) -> Duration {
    Duration::from_millis(rng.gen_range(min_ms..=max_ms))
}

fn pick<R: Rng>(rng: &mut R, pool: &[&'static str]) -> &'static str {
    pool.choose(rng).copied().unwrap_or_default()
}

/// Viewer counter driven by a bounded ±1 random walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerCount {
    value: u32,
    min: u32,
    max: u32,
}

impl ViewerCount {
    /// `initial` is clamped into `[min, max]`.
    pub fn new(initial: u32, min: u32, max: u32) -> Self {
        Self {
            value: initial.clamp(min, max),
            min,
            max,
        }
    }

    pub fn get(&self) -> u32 {
        self.value
    }

    /// Step by +1 or -1, staying inside the bounds.
    pub fn jitter<R: Rng>(&mut self, rng: &mut R) -> u32 {
        let stepped = if rng.gen_bool(0.5) {
            self.value.saturating_add(1)
        } else {
            self.value.saturating_sub(1)
        };
        self.value = stepped.clamp(self.min, self.max);
        self.value
    }
}

/// Plans the synthetic producers of one session.
#[derive(Debug)]
pub struct ScheduleCoordinator {
    host_name: String,
    welcome_delay: Duration,
    burst: (usize, usize),
    burst_gap_ms: (u64, u64),
    typing_lead: Duration,
    typing_ms: (u64, u64),
    toast_interval_ms: (u64, u64),
    next_toast_id: u64,
}

impl ScheduleCoordinator {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            host_name: config.host_name.clone(),
            welcome_delay: config.welcome_delay(),
            burst: (config.burst_min, config.burst_max),
            burst_gap_ms: (config.burst_gap_min_ms, config.burst_gap_max_ms),
            typing_lead: config.script_typing_lead(),
            typing_ms: (config.script_typing_min_ms, config.script_typing_max_ms),
            toast_interval_ms: (config.toast_interval_min_ms, config.toast_interval_max_ms),
            next_toast_id: 1,
        }
    }

    /// Welcome, attendee burst and Q&A script, ordered by `fire_at`.
    pub fn plan<R: Rng>(&self, rng: &mut R) -> Vec<ScheduledTask> {
        let mut tasks = vec![ScheduledTask {
            fire_at: self.welcome_delay,
            kind: TaskKind::Post(NewMessage::host(&self.host_name, WELCOME_MESSAGE)),
        }];
        tasks.extend(self.plan_burst(rng, self.welcome_delay));
        tasks.extend(self.plan_script(rng));
        tasks.sort_by_key(|t| t.fire_at);
        tasks
    }

    /// 15–20 attendee messages, each a uniform gap after the previous one.
    pub fn plan_burst<R: Rng>(&self, rng: &mut R, start: Duration) -> Vec<ScheduledTask> {
        let count = rng.gen_range(self.burst.0..=self.burst.1);
        let mut offset = start;
        (0..count)
            .map(|_| {
                offset += uniform_ms(rng, self.burst_gap_ms.0, self.burst_gap_ms.1);
                ScheduledTask {
                    fire_at: offset,
                    kind: TaskKind::Post(NewMessage::attendee(
                        pick(rng, ATTENDEE_NAMES),
                        pick(rng, ATTENDEE_LINES),
                    )),
                }
            })
            .collect()
    }

    /// For each script row: the question, then a typing window 1.2s later.
    pub fn plan_script<R: Rng>(&self, rng: &mut R) -> Vec<ScheduledTask> {
        let mut tasks = Vec::with_capacity(QA_SCRIPT.len() * 3);
        for (index, row) in QA_SCRIPT.iter().enumerate() {
            let asked = Duration::from_secs(row.at_secs);
            let typing_from = asked + self.typing_lead;
            let typing_for = uniform_ms(rng, self.typing_ms.0, self.typing_ms.1);
            let source = TypingSource::Script(index);
            tasks.push(ScheduledTask {
                fire_at: asked,
                kind: TaskKind::Post(NewMessage::attendee(row.name, row.text)),
            });
            tasks.push(ScheduledTask {
                fire_at: typing_from,
                kind: TaskKind::TypingStart(source),
            });
            tasks.push(ScheduledTask {
                fire_at: typing_from + typing_for,
                kind: TaskKind::TypingStop(source),
            });
        }
        tasks
    }

    /// Delay until the next investment toast.
    pub fn next_toast_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        uniform_ms(rng, self.toast_interval_ms.0, self.toast_interval_ms.1)
    }

    pub fn make_toast<R: Rng>(&mut self, rng: &mut R) -> Toast {
        let id = self.next_toast_id;
        self.next_toast_id += 1;
        let text = format!(
            "{} from {} just invested ${}",
            pick(rng, INVESTOR_NAMES),
            pick(rng, INVESTOR_CITIES),
            format_amount(INVEST_AMOUNTS.choose(rng).copied().unwrap_or(1_000)),
        );
        Toast { id, text }
    }
}

/// `2500` -> `"2,500"`.
pub fn format_amount(amount: u32) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SenderKind;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn coordinator() -> ScheduleCoordinator {
        ScheduleCoordinator::new(&SessionConfig::default())
    }

    #[test]
    fn plan_starts_with_welcome_at_two_seconds() {
        let mut rng = StdRng::seed_from_u64(1);
        let plan = coordinator().plan(&mut rng);
        assert_eq!(plan[0].fire_at, Duration::from_secs(2));
        match &plan[0].kind {
            TaskKind::Post(msg) => {
                assert_eq!(msg.sender_kind, SenderKind::Host);
                assert_eq!(msg.text, WELCOME_MESSAGE);
            }
            other => panic!("expected welcome post, got {other:?}"),
        }
    }

    #[test]
    fn plan_is_sorted() {
        let mut rng = StdRng::seed_from_u64(9);
        let plan = coordinator().plan(&mut rng);
        assert!(plan.windows(2).all(|w| w[0].fire_at <= w[1].fire_at));
    }

    #[test]
    fn script_contains_zapier_question_from_david() {
        let row = QA_SCRIPT
            .iter()
            .find(|r| r.at_secs == 450)
            .expect("450s row present");
        assert_eq!(row.text, "Does this work with Zapier?");
        assert_eq!(row.name, "David");
    }

    #[test]
    fn script_starts_after_longest_burst() {
        let cfg = SessionConfig::default();
        let longest = cfg.welcome_delay_ms + cfg.burst_max as u64 * cfg.burst_gap_max_ms;
        assert!(QA_SCRIPT[0].at_secs * 1_000 > longest);
        assert!(QA_SCRIPT.windows(2).all(|w| w[0].at_secs < w[1].at_secs));
    }

    #[test]
    fn script_typing_window_follows_question() {
        let mut rng = StdRng::seed_from_u64(3);
        let tasks = coordinator().plan_script(&mut rng);
        assert_eq!(tasks.len(), QA_SCRIPT.len() * 3);
        for chunk in tasks.chunks(3) {
            let lead = chunk[1].fire_at - chunk[0].fire_at;
            let window = chunk[2].fire_at - chunk[1].fire_at;
            assert_eq!(lead, Duration::from_millis(1_200));
            assert!(window >= Duration::from_secs(10) && window <= Duration::from_secs(20));
            assert!(matches!(chunk[1].kind, TaskKind::TypingStart(TypingSource::Script(_))));
            assert!(matches!(chunk[2].kind, TaskKind::TypingStop(TypingSource::Script(_))));
        }
    }

    #[test]
    fn toast_ids_increase_and_text_reads_invested() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut coord = coordinator();
        let a = coord.make_toast(&mut rng);
        let b = coord.make_toast(&mut rng);
        assert!(b.id > a.id);
        assert!(a.text.contains(" just invested $"), "{}", a.text);
    }

    #[test]
    fn toast_delay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(8);
        let coord = coordinator();
        for _ in 0..200 {
            let d = coord.next_toast_delay(&mut rng);
            assert!(d >= Duration::from_secs(30) && d <= Duration::from_secs(60));
        }
    }

    #[test]
    fn amount_formatting() {
        assert_eq!(format_amount(500), "500");
        assert_eq!(format_amount(2_500), "2,500");
        assert_eq!(format_amount(10_000), "10,000");
        assert_eq!(format_amount(1_234_567), "1,234,567");
    }

    #[test]
    fn viewer_initial_is_clamped() {
        assert_eq!(ViewerCount::new(10, 40, 50).get(), 40);
        assert_eq!(ViewerCount::new(99, 40, 50).get(), 50);
    }

    proptest! {
        #[test]
        fn burst_size_and_gaps_in_range(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let start = Duration::from_secs(2);
            let burst = coordinator().plan_burst(&mut rng, start);
            prop_assert!((15..=20).contains(&burst.len()));
            let mut prev = start;
            for task in &burst {
                let gap = task.fire_at - prev;
                prop_assert!(gap >= Duration::from_millis(500) && gap <= Duration::from_millis(1_500));
                prev = task.fire_at;
                let is_attendee = matches!(&task.kind, TaskKind::Post(m) if m.sender_kind == SenderKind::User);
                prop_assert!(is_attendee);
            }
        }

        #[test]
        fn viewer_count_stays_in_bounds(seed in any::<u64>(), ticks in 0usize..2_000) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut viewers = ViewerCount::new(45, 40, 50);
            for _ in 0..ticks {
                let before = viewers.get();
                let after = viewers.jitter(&mut rng);
                prop_assert!((40..=50).contains(&after));
                prop_assert!(before.abs_diff(after) <= 1);
            }
        }
    }
}
