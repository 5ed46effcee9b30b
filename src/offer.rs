//! Special-offer countdown.
//!
//! `Hidden -> Active -> Expired`, each edge taken at most once. Ticks outside
//! `Active` are no-ops, so a late tick can never reopen or re-close the offer.

use serde::{Deserialize, Serialize};

pub const OFFER_CLOSED_MESSAGE: &str =
    "⏰ The special offer has ended. Thank you to everyone who joined in!";

/// Where the countdown is in its single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferPhase {
    Hidden,
    Active { remaining_secs: u32 },
    Expired,
}

/// Edge taken by [`OfferCountdown::open`] or [`OfferCountdown::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferTransition {
    Opened { remaining_secs: u32 },
    Ticked { remaining_secs: u32 },
    Closed,
}

#[derive(Debug, Clone)]
pub struct OfferCountdown {
    phase: OfferPhase,
    duration_secs: u32,
}

impl OfferCountdown {
    pub fn new(duration_secs: u32) -> Self {
        Self {
            phase: OfferPhase::Hidden,
            duration_secs,
        }
    }

    pub fn phase(&self) -> OfferPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, OfferPhase::Active { .. })
    }

    pub fn remaining_secs(&self) -> Option<u32> {
        match self.phase {
            OfferPhase::Active { remaining_secs } => Some(remaining_secs),
            _ => None,
        }
    }

    /// `mm:ss` while active.
    pub fn display(&self) -> Option<String> {
        self.remaining_secs().map(format_mm_ss)
    }

    /// Reveal the offer. Only the first call from `Hidden` does anything.
    pub fn open(&mut self) -> Option<OfferTransition> {
        match self.phase {
            OfferPhase::Hidden => {
                self.phase = OfferPhase::Active {
                    remaining_secs: self.duration_secs,
                };
                Some(OfferTransition::Opened {
                    remaining_secs: self.duration_secs,
                })
            }
            _ => None,
        }
    }

    /// Count down one second. Reaching zero expires the offer.
    pub fn tick(&mut self) -> Option<OfferTransition> {
        let OfferPhase::Active { remaining_secs } = self.phase else {
            return None;
        };
        let remaining_secs = remaining_secs.saturating_sub(1);
        if remaining_secs == 0 {
            self.phase = OfferPhase::Expired;
            Some(OfferTransition::Closed)
        } else {
            self.phase = OfferPhase::Active { remaining_secs };
            Some(OfferTransition::Ticked { remaining_secs })
        }
    }

    /// System message posted when the offer opens.
    pub fn announcement(&self) -> String {
        format!(
            "🔥 Special offer unlocked! Available for the next {} only. Click \"Invest Now\" to claim your spot.",
            describe_duration(self.duration_secs)
        )
    }
}

pub fn format_mm_ss(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn describe_duration(secs: u32) -> String {
    match (secs / 60, secs % 60) {
        (1, 0) => "1 minute".to_string(),
        (m, 0) => format!("{m} minutes"),
        _ => format!("{secs} seconds"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(600, "10:00")]
    #[case(599, "09:59")]
    #[case(61, "01:01")]
    #[case(9, "00:09")]
    #[case(0, "00:00")]
    fn mm_ss(#[case] secs: u32, #[case] expected: &str) {
        assert_eq!(format_mm_ss(secs), expected);
    }

    #[test]
    fn starts_hidden_without_display() {
        let offer = OfferCountdown::new(600);
        assert_eq!(offer.phase(), OfferPhase::Hidden);
        assert!(offer.display().is_none());
    }

    #[test]
    fn tick_before_open_is_noop() {
        let mut offer = OfferCountdown::new(600);
        assert!(offer.tick().is_none());
        assert_eq!(offer.phase(), OfferPhase::Hidden);
    }

    #[test]
    fn open_only_once() {
        let mut offer = OfferCountdown::new(600);
        assert_eq!(offer.open(), Some(OfferTransition::Opened { remaining_secs: 600 }));
        assert_eq!(offer.display().as_deref(), Some("10:00"));
        assert!(offer.open().is_none());
    }

    #[test]
    fn full_countdown_closes_once() {
        let mut offer = OfferCountdown::new(600);
        offer.open();
        let mut closed = 0;
        let mut last = 600;
        for _ in 0..600 {
            match offer.tick() {
                Some(OfferTransition::Ticked { remaining_secs }) => {
                    assert_eq!(remaining_secs, last - 1);
                    last = remaining_secs;
                }
                Some(OfferTransition::Closed) => closed += 1,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(closed, 1);
        assert_eq!(last, 1);
        assert_eq!(offer.phase(), OfferPhase::Expired);
        assert!(offer.tick().is_none());
        assert!(offer.open().is_none());
    }

    #[test]
    fn announcement_names_duration() {
        assert!(OfferCountdown::new(600).announcement().contains("10 minutes"));
        assert!(OfferCountdown::new(60).announcement().contains("1 minute "));
        assert!(OfferCountdown::new(45).announcement().contains("45 seconds"));
    }

    proptest! {
        #[test]
        fn extra_ticks_never_reopen(duration in 1u32..900, extra in 0usize..50) {
            let mut offer = OfferCountdown::new(duration);
            offer.open();
            let transitions: Vec<_> = (0..duration as usize + extra).filter_map(|_| offer.tick()).collect();
            prop_assert_eq!(transitions.len(), duration as usize);
            prop_assert_eq!(transitions.last(), Some(&OfferTransition::Closed));
            prop_assert_eq!(offer.phase(), OfferPhase::Expired);
        }
    }
}
