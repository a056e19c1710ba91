use pretty_assertions::assert_eq;
use runcheck_format::CheckOpt;
use serde_json::{json, Value};

mod utils;
use utils::run_checker;

#[test]
fn overlong_answer_is_repaired_and_the_run_stays_clean() {
    let dir = tempfile::TempDir::new().unwrap();
    let runfile = dir.path().join("biogen.json");

    let filler = vec!["word"; 250].join(" ");
    let mut results: Vec<Value> = (116..=180)
        .map(|t| {
            json!({
                "topic_id": t.to_string(),
                "references": ["123"],
                "answer": [{"text": "A short answer [123]."}],
            })
        })
        .collect();
    // 500 tokens across two sentences, 100 over the cap
    results[0]["answer"] = json!([
        {"text": filler.clone()},
        {"text": filler.clone()},
    ]);
    let doc = json!({
        "team_id": "team",
        "run_name": "run1",
        "contact_email": "team@example.org",
        "results": results,
    });
    std::fs::write(&runfile, doc.to_string()).unwrap();

    let verdict = run_checker("biogen", &CheckOpt::new(&runfile));
    assert!(verdict.clean, "{}", verdict.errlog);

    let warnings: Vec<String> = verdict
        .errlog
        .lines()
        .filter(|line| line.starts_with("WARNING"))
        .map(str::to_owned)
        .collect();
    assert_eq!(
        warnings,
        vec![
            "WARNING Item 1: Attempting to fix answer of length 500".to_owned(),
            format!("WARNING Item 1: Removing a sentence from the end: {filler}"),
            "WARNING Item 1: Updated length: 250".to_owned(),
        ]
    );
}
