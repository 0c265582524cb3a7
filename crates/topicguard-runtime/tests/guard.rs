//! End-to-end guard behavior with scripted models.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use topicguard_core::{ConfigurationError, Rejection, Threshold, TopicConfiguration, Verdict};
use topicguard_runtime::{
    ClassifierError, ClientArgs, GuardError, LlmCallable, ResolverError, RetryPolicy, TopicGuard,
    TopicResolver, ValidateOptions, ZeroShotClassifier, ZeroShotOutput,
};

/// Returns fixed scores and records the candidate lists it was asked about.
struct ScriptedClassifier {
    labels: Vec<String>,
    scores: Vec<f64>,
    calls: AtomicUsize,
    asked: Mutex<Vec<Vec<String>>>,
}

impl ScriptedClassifier {
    fn new(pairs: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            labels: pairs.iter().map(|(l, _)| l.to_string()).collect(),
            scores: pairs.iter().map(|(_, s)| *s).collect(),
            calls: AtomicUsize::new(0),
            asked: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ZeroShotClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        _text: &str,
        candidate_labels: &[String],
    ) -> Result<ZeroShotOutput, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.asked.lock().unwrap().push(candidate_labels.to_vec());
        Ok(ZeroShotOutput::new(self.labels.clone(), self.scores.clone()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct FailingClassifier;

#[async_trait]
impl ZeroShotClassifier for FailingClassifier {
    async fn classify(
        &self,
        _text: &str,
        _candidate_labels: &[String],
    ) -> Result<ZeroShotOutput, ClassifierError> {
        Err(ClassifierError::Http("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Answers with a fixed topic and records what it was asked.
struct FixedResolver {
    topic: String,
    calls: AtomicUsize,
    asked: Mutex<Vec<(Vec<String>, Option<String>)>>,
}

impl FixedResolver {
    fn new(topic: &str) -> Arc<Self> {
        Arc::new(Self {
            topic: topic.to_string(),
            calls: AtomicUsize::new(0),
            asked: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicResolver for FixedResolver {
    async fn resolve(
        &self,
        _text: &str,
        candidates: &[String],
        client_args: &ClientArgs,
    ) -> Result<String, ResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.asked.lock().unwrap().push((
            candidates.to_vec(),
            client_args.api_key.as_ref().map(|k| k.expose().to_string()),
        ));
        Ok(self.topic.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

fn topics() -> TopicConfiguration {
    TopicConfiguration::new(["sports"]).with_invalid_topics(["politics", "finance"])
}

fn strings(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

// --- configuration ---

#[tokio::test]
async fn empty_topic_sets_rejected_in_every_mode() {
    let cases = [(true, true), (true, false), (false, true)];
    for (classifier, llm) in cases {
        for config in [
            TopicConfiguration::new(Vec::<String>::new()).with_invalid_topics(["politics"]),
            TopicConfiguration::new(["sports"]),
        ] {
            let classifier_mock = ScriptedClassifier::new(&[]);
            let resolver = FixedResolver::new("sports");
            let guard = TopicGuard::builder(config.with_classifier(classifier).with_llm(llm))
                .classifier(classifier_mock.clone())
                .resolver(resolver.clone())
                .build()
                .unwrap();

            let err = guard.validate("text").await.unwrap_err();
            assert!(err.is_configuration(), "unexpected error: {err}");
            assert_eq!(classifier_mock.calls(), 0);
            assert_eq!(resolver.calls(), 0);
        }
    }
}

#[tokio::test]
async fn overlapping_topics_rejected() {
    let guard = TopicGuard::builder(
        TopicConfiguration::new(["sports", "politics"]).with_invalid_topics(["politics"]),
    )
    .classifier(ScriptedClassifier::new(&[]))
    .resolver(FixedResolver::new("sports"))
    .build()
    .unwrap();

    let err = guard.validate("text").await.unwrap_err();
    assert!(matches!(
        err,
        GuardError::Configuration(ConfigurationError::OverlappingTopics { ref topics })
            if topics == &strings(&["politics"])
    ));
}

#[tokio::test]
async fn both_models_disabled_rejected() {
    let guard = TopicGuard::builder(topics().with_classifier(false).with_llm(false))
        .build()
        .unwrap();
    let err = guard.validate("text").await.unwrap_err();
    assert!(matches!(
        err,
        GuardError::Configuration(ConfigurationError::NoModelEnabled)
    ));
}

// --- ensemble ---

#[tokio::test]
async fn ensemble_flagged_invalid_topic_skips_llm() {
    let classifier = ScriptedClassifier::new(&[("politics", 0.8), ("finance", 0.7)]);
    let resolver = FixedResolver::new("sports");
    let guard = TopicGuard::builder(topics())
        .classifier(classifier.clone())
        .resolver(resolver.clone())
        .build()
        .unwrap();

    let assessment = guard.assess("Parliament voted on the budget").await.unwrap();

    assert_eq!(
        assessment.verdict,
        Verdict::Fail(Rejection::InvalidTopicsFound {
            topics: strings(&["politics", "finance"])
        })
    );
    assert_eq!(classifier.calls(), 1);
    assert_eq!(resolver.calls(), 0);
    assert!(!assessment.llm_consulted());
}

#[tokio::test]
async fn ensemble_scores_only_invalid_topics() {
    let classifier = ScriptedClassifier::new(&[("politics", 0.1), ("finance", 0.1)]);
    let guard = TopicGuard::builder(topics())
        .classifier(classifier.clone())
        .resolver(FixedResolver::new("sports"))
        .build()
        .unwrap();

    guard.validate("text").await.unwrap();

    let asked = classifier.asked.lock().unwrap();
    assert_eq!(asked[0], strings(&["finance", "politics"]));
}

#[tokio::test]
async fn ensemble_clean_screen_llm_picks_valid_topic() {
    let classifier = ScriptedClassifier::new(&[("politics", 0.2), ("finance", 0.1)]);
    let resolver = FixedResolver::new("sports");
    let guard = TopicGuard::builder(topics())
        .classifier(classifier.clone())
        .resolver(resolver.clone())
        .build()
        .unwrap();

    let assessment = guard.assess("What a goal!").await.unwrap();

    assert_eq!(assessment.verdict, Verdict::Pass);
    assert_eq!(assessment.resolved_topic.as_deref(), Some("sports"));
    assert_eq!(resolver.calls(), 1);
    let asked = resolver.asked.lock().unwrap();
    assert_eq!(asked[0].0, strings(&["finance", "politics"]));
}

#[tokio::test]
async fn ensemble_clean_screen_llm_picks_other_topic() {
    let guard = TopicGuard::builder(topics())
        .classifier(ScriptedClassifier::new(&[("politics", 0.2)]))
        .resolver(FixedResolver::new("weather"))
        .build()
        .unwrap();

    let verdict = guard.validate("Rain tomorrow").await.unwrap();
    assert_eq!(
        verdict,
        Verdict::Fail(Rejection::MostRelevantTopic {
            topic: "weather".into()
        })
    );
    assert_eq!(verdict.message().unwrap(), "Most relevant topic is weather.");
}

#[tokio::test]
async fn ensemble_score_equal_to_threshold_is_not_flagged() {
    let resolver = FixedResolver::new("sports");
    let guard = TopicGuard::builder(topics())
        .classifier(ScriptedClassifier::new(&[("politics", 0.5)]))
        .resolver(resolver.clone())
        .build()
        .unwrap();

    assert_eq!(guard.validate("text").await.unwrap(), Verdict::Pass);
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test]
async fn classifier_error_propagates() {
    let resolver = FixedResolver::new("sports");
    let guard = TopicGuard::builder(topics())
        .classifier(Arc::new(FailingClassifier))
        .resolver(resolver.clone())
        .build()
        .unwrap();

    let err = guard.validate("text").await.unwrap_err();
    assert!(matches!(err, GuardError::Classifier(ClassifierError::Http(_))));
    assert_eq!(resolver.calls(), 0);
}

// --- classifier only ---

#[tokio::test]
async fn classifier_only_valid_topic_confirmed() {
    let classifier = ScriptedClassifier::new(&[("sports", 0.9), ("politics", 0.3)]);
    let guard = TopicGuard::builder(topics().with_llm(false))
        .classifier(classifier.clone())
        .build()
        .unwrap();

    let assessment = guard.assess("Final score 3-1").await.unwrap();
    assert_eq!(assessment.verdict, Verdict::Pass);
    assert_eq!(assessment.scores.as_ref().map(Vec::len), Some(2));

    let asked = classifier.asked.lock().unwrap();
    assert_eq!(asked[0], strings(&["finance", "politics", "sports"]));
}

#[tokio::test]
async fn classifier_only_invalid_topic_found() {
    let guard = TopicGuard::builder(topics().with_llm(false))
        .classifier(ScriptedClassifier::new(&[("sports", 0.2), ("politics", 0.6)]))
        .build()
        .unwrap();

    let verdict = guard.validate("text").await.unwrap();
    assert_eq!(
        verdict,
        Verdict::Fail(Rejection::InvalidTopicFound {
            topic: "politics".into()
        })
    );
}

#[tokio::test]
async fn classifier_only_first_invalid_in_returned_order_wins() {
    let guard = TopicGuard::builder(topics().with_llm(false))
        .classifier(ScriptedClassifier::new(&[
            ("sports", 0.95),
            ("finance", 0.9),
            ("politics", 0.99),
        ]))
        .build()
        .unwrap();

    assert_eq!(
        guard.validate("text").await.unwrap(),
        Verdict::Fail(Rejection::InvalidTopicFound {
            topic: "finance".into()
        })
    );
}

#[tokio::test]
async fn classifier_only_nothing_over_threshold() {
    let guard = TopicGuard::builder(
        topics()
            .with_llm(false)
            .with_threshold(Threshold::new(0.8).unwrap()),
    )
    .classifier(ScriptedClassifier::new(&[("sports", 0.8), ("politics", 0.1)]))
    .build()
    .unwrap();

    assert_eq!(
        guard.validate("text").await.unwrap(),
        Verdict::Fail(Rejection::NoValidTopic)
    );
}

// --- llm only ---

#[tokio::test]
async fn llm_only_invalid_answer_fails() {
    let resolver = FixedResolver::new("politics");
    let guard = TopicGuard::builder(topics().with_classifier(false))
        .resolver(resolver.clone())
        .build()
        .unwrap();

    let verdict = guard.validate("Vote!").await.unwrap();
    assert_eq!(
        verdict,
        Verdict::Fail(Rejection::MostRelevantTopic {
            topic: "politics".into()
        })
    );
    assert_eq!(resolver.calls(), 1);
}

// --- client arguments ---

#[tokio::test]
async fn per_call_client_args_override_defaults() {
    let resolver = FixedResolver::new("sports");
    let guard = TopicGuard::builder(topics().with_classifier(false))
        .resolver(resolver.clone())
        .client_args(ClientArgs::new().with_api_key("default-key"))
        .build()
        .unwrap();

    guard.validate("text").await.unwrap();
    guard
        .validate_with(
            "text",
            &ValidateOptions::new().with_client_args(ClientArgs::new().with_api_key("call-key")),
        )
        .await
        .unwrap();

    let asked = resolver.asked.lock().unwrap();
    assert_eq!(asked[0].1.as_deref(), Some("default-key"));
    assert_eq!(asked[1].1.as_deref(), Some("call-key"));
}

// --- retries ---

#[tokio::test(start_paused = true)]
async fn resolver_recovers_on_fifth_attempt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let guard = TopicGuard::builder(topics().with_classifier(false))
        .llm_callable(LlmCallable::function(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) < 4 {
                Err(ResolverError::Transient("service unavailable".into()))
            } else {
                Ok("sports".to_string())
            }
        }))
        .build()
        .unwrap();

    assert_eq!(guard.validate("text").await.unwrap(), Verdict::Pass);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn resolver_gives_up_after_five_attempts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let guard = TopicGuard::builder(topics().with_classifier(false))
        .llm_callable(LlmCallable::function(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ResolverError::Transient("service unavailable".into()))
        }))
        .build()
        .unwrap();

    let err = guard.validate("text").await.unwrap_err();
    assert!(matches!(err, GuardError::Resolver(ResolverError::Transient(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn retry_policy_applies_to_custom_function() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let guard = TopicGuard::builder(topics().with_classifier(false))
        .retry_policy(RetryPolicy::default().with_max_attempts(2))
        .llm_callable(LlmCallable::function(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ResolverError::Transient("busy".into()))
        }))
        .build()
        .unwrap();

    assert!(guard.validate("text").await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn guard_is_shareable_across_tasks() {
    let guard = Arc::new(
        TopicGuard::builder(topics().with_llm(false))
            .classifier(ScriptedClassifier::new(&[("sports", 0.9)]))
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let guard = guard.clone();
            tokio::spawn(async move { guard.validate("text").await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Verdict::Pass);
    }
}
