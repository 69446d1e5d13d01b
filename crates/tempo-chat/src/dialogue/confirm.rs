//! Yes/no reply recognition.

/// How a reply to a yes/no prompt reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    /// "add info": the user wants to change the proposal first.
    AddInfo,
    Unclear,
}

/// Which yes-vocabulary applies. Creation also accepts "go ahead" and
/// "that's enough"; destructive prompts accept only plain agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    Create,
    Destructive,
}

const YES_COMMON: &[&str] = &["yes", "y", "ok", "okay", "confirm", "sure", "yes please", "yep", "yeah"];
const YES_CREATE_ONLY: &[&str] = &["go ahead", "that's enough", "thats enough"];
const NO: &[&str] = &["no", "n", "cancel", "nope", "never mind", "nevermind", "stop", "no thanks"];
const ADD_INFO: &[&str] = &["add info", "add more info", "add information", "add more"];

fn normalize(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let stripped = lower.trim_end_matches(['.', '!', '?', ',']);
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn parse_confirmation(text: &str, vocabulary: Vocabulary) -> Confirmation {
    let reply = normalize(text);
    let reply = reply.as_str();
    if YES_COMMON.contains(&reply)
        || (vocabulary == Vocabulary::Create && YES_CREATE_ONLY.contains(&reply))
    {
        Confirmation::Yes
    } else if NO.contains(&reply) {
        Confirmation::No
    } else if vocabulary == Vocabulary::Create && ADD_INFO.contains(&reply) {
        Confirmation::AddInfo
    } else {
        Confirmation::Unclear
    }
}

/// Whether the user is backing out of whatever was asked.
pub fn is_dismissal(text: &str) -> bool {
    NO.contains(&normalize(text).as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yes_variants() {
        for reply in ["yes", "Y", "ok", "Sure!", "confirm.", "  yes   please "] {
            assert_eq!(
                parse_confirmation(reply, Vocabulary::Destructive),
                Confirmation::Yes,
                "{reply}"
            );
        }
    }

    #[test]
    fn test_create_only_phrases() {
        assert_eq!(
            parse_confirmation("Go ahead", Vocabulary::Create),
            Confirmation::Yes
        );
        assert_eq!(
            parse_confirmation("that's enough", Vocabulary::Create),
            Confirmation::Yes
        );
        assert_eq!(
            parse_confirmation("go ahead", Vocabulary::Destructive),
            Confirmation::Unclear
        );
        assert_eq!(
            parse_confirmation("add info", Vocabulary::Create),
            Confirmation::AddInfo
        );
    }

    #[test]
    fn test_no_variants() {
        for reply in ["no", "n", "Cancel", "nope", "never mind", "STOP"] {
            assert_eq!(
                parse_confirmation(reply, Vocabulary::Create),
                Confirmation::No,
                "{reply}"
            );
        }
    }

    #[test]
    fn test_unclear() {
        assert_eq!(
            parse_confirmation("maybe later", Vocabulary::Destructive),
            Confirmation::Unclear
        );
        assert_eq!(
            parse_confirmation("yes but at 4pm", Vocabulary::Create),
            Confirmation::Unclear
        );
    }

    #[test]
    fn test_dismissal() {
        assert!(is_dismissal("Never mind."));
        assert!(!is_dismissal("2"));
    }
}
