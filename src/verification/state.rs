//! Verification state machine steps and turn outcomes.

use serde::{Deserialize, Serialize};

/// The steps of the verification flow.
///
/// Route → (Verify ⇄ Collect) → Respond. `Collect` is the only step a
/// conversation can be suspended at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Route,
    Verify,
    Collect,
    Respond,
}

impl Step {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Step) -> bool {
        use Step::*;
        matches!(
            (self, target),
            (Route, Verify)
                | (Route, Respond)
                | (Verify, Respond)
                | (Verify, Collect)
                | (Collect, Verify)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Route => "route",
            Self::Verify => "verify",
            Self::Collect => "collect",
            Self::Respond => "respond",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "route" => Ok(Self::Route),
            "verify" => Ok(Self::Verify),
            "collect" => Ok(Self::Collect),
            "respond" => Ok(Self::Respond),
            other => Err(format!("unknown step '{other}'")),
        }
    }
}

/// What the host gets back from one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The specialist answered.
    Responded {
        reply: String,
        customer_id: Option<String>,
        /// Assistant messages appended before the reply, such as the
        /// verification welcome.
        messages: Vec<String>,
        /// Steps visited this turn, in order.
        steps: Vec<Step>,
    },
    /// The flow is suspended until the customer sends an email address.
    AwaitingInput {
        prompt: String,
        /// Assistant messages appended during this turn.
        messages: Vec<String>,
        steps: Vec<Step>,
    },
}

impl TurnOutcome {
    pub fn steps(&self) -> &[Step] {
        match self {
            Self::Responded { steps, .. } | Self::AwaitingInput { steps, .. } => steps,
        }
    }

    pub fn is_awaiting_input(&self) -> bool {
        matches!(self, Self::AwaitingInput { .. })
    }

    /// Text to show the customer for this turn.
    pub fn display_lines(&self) -> Vec<&str> {
        match self {
            Self::Responded {
                reply, messages, ..
            } => messages
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(reply.as_str()))
                .collect(),
            Self::AwaitingInput {
                prompt, messages, ..
            } => messages
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(prompt.as_str()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(Step::Route.can_transition_to(Step::Verify));
        assert!(Step::Route.can_transition_to(Step::Respond));
        assert!(Step::Verify.can_transition_to(Step::Collect));
        assert!(Step::Collect.can_transition_to(Step::Verify));
        assert!(Step::Verify.can_transition_to(Step::Respond));
    }

    #[test]
    fn invalid_transitions() {
        assert!(!Step::Route.can_transition_to(Step::Collect));
        assert!(!Step::Collect.can_transition_to(Step::Route));
        assert!(!Step::Collect.can_transition_to(Step::Respond));
        assert!(!Step::Respond.can_transition_to(Step::Route));
    }

    #[test]
    fn display_matches_serde() {
        for step in [Step::Route, Step::Verify, Step::Collect, Step::Respond] {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{step}\""));
            assert_eq!(step.to_string().parse::<Step>().unwrap(), step);
        }
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = TurnOutcome::AwaitingInput {
            prompt: "Please provide your email:".into(),
            messages: vec!["To access information about your account or orders, please provide your email address.".into()],
            steps: vec![Step::Route, Step::Verify, Step::Collect],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "awaiting_input");
        assert_eq!(json["steps"][2], "collect");
        assert_eq!(outcome.display_lines().len(), 2);
    }

    #[test]
    fn responded_shows_notices_before_reply() {
        let outcome = TurnOutcome::Responded {
            reply: "Your order has shipped.".into(),
            customer_id: Some("CUST-001".into()),
            messages: vec!["✓ Verified! Welcome back, Sarah Chen.".into()],
            steps: vec![Step::Verify, Step::Respond],
        };
        assert_eq!(
            outcome.display_lines(),
            vec!["✓ Verified! Welcome back, Sarah Chen.", "Your order has shipped."]
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "responded");
        assert_eq!(json["messages"][0], "✓ Verified! Welcome back, Sarah Chen.");
    }
}
