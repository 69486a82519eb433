use medicare_assistant::assistant::{ Assistant, TypingDelay };
use medicare_assistant::config::replies::{ default_table, Intent, FALLBACK_REPLY };

fn assistant() -> Assistant {
    Assistant::with_table(default_table(), TypingDelay::none())
}

const GREETING_REPLY: &str =
    "Hello! I'm here to help with your healthcare needs. What can I assist you with today?";

#[test]
fn greetings_in_any_case_get_greeting_reply() {
    let a = assistant();
    for utterance in ["hello", "HELLO there", "Hi", "oh hI, medicine please", "say hello to the doctor"] {
        assert_eq!(a.reply(utterance), GREETING_REPLY, "utterance: {:?}", utterance);
    }
}

#[test]
fn utterances_without_keywords_get_exact_fallback() {
    let a = assistant();
    for utterance in ["asdfqwer", "", "   ", "12345", "ok", "thanks"] {
        assert_eq!(a.reply(utterance), FALLBACK_REPLY, "utterance: {:?}", utterance);
        assert_eq!(a.classify(utterance), Intent::Fallback);
    }
}

#[test]
fn store_question_gets_location_reply() {
    let a = assistant();
    assert_eq!(a.classify("Where is your store located?"), Intent::Location);
    assert!(a.reply("Where is your store located?").starts_with("Our main store is at 123 Health Street"));
}

#[test]
fn quick_actions_map_to_their_own_rules() {
    let a = assistant();
    let expected = [
        ("Check medicine availability", Intent::Medicine),
        ("Track my order", Intent::Order),
        ("Prescription upload", Intent::Prescription),
        ("Emergency delivery", Intent::Emergency),
        ("Health consultation", Intent::Consultation),
        ("Store locations", Intent::Location),
    ];
    for (utterance, intent) in expected {
        assert_eq!(a.classify(utterance), intent, "utterance: {:?}", utterance);
    }
}

#[test]
fn reply_is_total_over_odd_input() {
    let a = assistant();
    let long = "x".repeat(10_000);
    for utterance in ["\u{0}", "ÄÖÜ", "💊 tablet", "İstanbul", long.as_str()] {
        assert!(!a.reply(utterance).is_empty());
    }
    assert_eq!(a.classify("💊 TABLET"), Intent::Medicine);
}

#[test]
fn shipped_replies_file_matches_built_in_table() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/json/replies.json");
    let loaded = medicare_assistant::config::replies::load_replies(path).unwrap();
    let built_in = default_table();
    assert_eq!(loaded.greeting, built_in.greeting);
    assert_eq!(loaded.fallback, built_in.fallback);
    assert_eq!(loaded.quick_actions, built_in.quick_actions);
    assert_eq!(loaded.rules.len(), built_in.rules.len());
    for (a, b) in loaded.rules.iter().zip(built_in.rules.iter()) {
        assert_eq!(a.intent, b.intent);
        assert_eq!(a.keywords, b.keywords);
        assert_eq!(a.response, b.response);
    }
}
