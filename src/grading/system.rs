//! Single-session grading façade.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analyzer::{
    FirstCandidate, KeywordTopicAnalyzer, RelationshipType, TopicAnalyzer, TopicSelector, DEFAULT_TOPIC,
};
use crate::config::{Config, ValidationConfig};
use crate::error::{AppResult, TreeError, ValidationError};
use crate::models::{ConversationTree, QaPair, TopicNode};
use crate::scoring::{ScoringContext, ScoringEngine, ScoringStrategy};
use crate::session::SessionPayload;
use crate::tree::{CurrentPosition, TopicTreeManager, TreeNavigator, TreeStats};
use crate::validation::{
    sanitize_qa_pair, scan_for_security_issues, validate_qa_pair, validate_score, validate_topic_name,
    SecurityReport,
};

/// Most recent Q&A pairs handed to the scoring engine as history.
const HISTORY_WINDOW: usize = 100;

/// Grades one conversation.
///
/// Each Q&A pair becomes a topic node placed by the analyzer and scored by
/// the engine; the current path always ends at the latest node.
pub struct ConversationGradingSystem {
    manager: TopicTreeManager,
    analyzer: Arc<dyn TopicAnalyzer>,
    engine: ScoringEngine,
    selector: Arc<dyn TopicSelector>,
    validation: ValidationConfig,
}

impl std::fmt::Debug for ConversationGradingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationGradingSystem")
            .field("session_id", &self.manager.session_id())
            .field("nodes", &self.manager.tree().len())
            .field("engine", &self.engine)
            .field("selector", &self.selector)
            .finish()
    }
}

impl ConversationGradingSystem {
    /// Create a system with the default analyzer, engine and topic selector.
    pub fn new(session_id: impl Into<String>) -> AppResult<Self> {
        Ok(Self::with_manager(TopicTreeManager::new(session_id)?))
    }

    /// Create a system wired from configuration.
    pub fn from_config(session_id: impl Into<String>, config: &Config) -> AppResult<Self> {
        Ok(Self::new(session_id)?
            .with_analyzer(Arc::new(KeywordTopicAnalyzer::new(config.analyzer.clone())))
            .with_scoring_engine(ScoringEngine::from_config(&config.scoring)?)
            .with_validation_config(config.validation.clone()))
    }

    /// Resume grading over an existing tree, which is validated first.
    pub fn from_tree(tree: ConversationTree) -> AppResult<Self> {
        Ok(Self::with_manager(TopicTreeManager::from_tree(tree)?))
    }

    fn with_manager(manager: TopicTreeManager) -> Self {
        Self {
            manager,
            analyzer: Arc::new(KeywordTopicAnalyzer::default()),
            engine: ScoringEngine::default(),
            selector: Arc::new(FirstCandidate),
            validation: ValidationConfig::default(),
        }
    }

    /// Replace the topic analyzer.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn TopicAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Replace the scoring engine.
    pub fn with_scoring_engine(mut self, engine: ScoringEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the topic selection policy.
    pub fn with_topic_selector(mut self, selector: Arc<dyn TopicSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Replace the input screening policy.
    pub fn with_validation_config(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    /// Swap the engine's primary strategy.
    pub fn set_scoring_strategy(&mut self, strategy: Arc<dyn ScoringStrategy>) -> AppResult<()> {
        self.engine.set_strategy(strategy)?;
        Ok(())
    }

    /// Record an exchange and return the id of the node created for it.
    ///
    /// Nothing is mutated unless every step succeeds. `score_override`
    /// bypasses the scoring engine.
    pub async fn add_qa_pair(&mut self, qa_pair: QaPair, score_override: Option<f64>) -> AppResult<String> {
        validate_qa_pair(&qa_pair)?;
        if let Some(score) = score_override {
            validate_score(score)?;
        }

        let qa_pair = sanitize_qa_pair(&qa_pair);
        validate_qa_pair(&qa_pair)?;
        self.screen(&qa_pair)?;

        let topics = self.analyzer.extract_topics(&qa_pair).await?;
        let topic = self
            .selector
            .select(&topics)
            .unwrap_or(DEFAULT_TOPIC)
            .to_string();
        validate_topic_name(&topic)?;

        let existing = self.manager.tree().nodes_in_order();
        let relationship = self
            .analyzer
            .determine_relationship(&topic, &qa_pair.question, &existing)
            .await?;
        let parent_id = self.resolve_parent(relationship.relationship_type, relationship.parent_node_id)?;

        let mut node = TopicNode::new(topic).with_qa_pair(qa_pair.clone());
        if let Some(parent_id) = &parent_id {
            node.depth = self.manager.tree().require(parent_id)?.depth + 1;
            node = node.with_parent(parent_id.clone());
        }

        let score = match score_override {
            Some(score) => score,
            None => {
                let history = self.manager.tree().recent_qa_pairs(HISTORY_WINDOW);
                let context = ScoringContext::new(node.clone(), history);
                self.engine.calculate_score(&qa_pair, &context).await?
            }
        };
        let node = node.with_score(score);

        let id = self.manager.add_node(node)?;
        self.manager.focus(&id)?;

        info!(
            session_id = %self.manager.session_id(),
            node_id = %id,
            relationship = %relationship.relationship_type,
            confidence = relationship.confidence,
            score,
            "Q&A pair graded"
        );
        Ok(id)
    }

    fn screen(&self, qa_pair: &QaPair) -> AppResult<()> {
        let report = screen_qa_pair(qa_pair);
        if report.is_safe() {
            return Ok(());
        }

        if self.validation.reject_unsafe_input {
            return Err(ValidationError::new(
                "qa_pair",
                report.summary(),
                "rejected by security screening",
            )
            .into());
        }
        warn!(
            session_id = %self.manager.session_id(),
            issues = %report.summary(),
            "Q&A pair flagged by security screening"
        );
        Ok(())
    }

    /// Map a classification onto the parent the new node attaches to.
    fn resolve_parent(
        &self,
        relationship_type: RelationshipType,
        target: Option<String>,
    ) -> AppResult<Option<String>> {
        if relationship_type == RelationshipType::NewRoot {
            return Ok(None);
        }

        let target = target.ok_or_else(|| {
            ValidationError::new(
                "parent_node_id",
                "",
                format!("required for a {} relationship", relationship_type),
            )
        })?;
        let node = self
            .manager
            .get_node(&target)
            .ok_or_else(|| TreeError::NodeNotFound { node_id: target.clone() })?;

        let parent = match relationship_type {
            RelationshipType::SiblingOf => node.parent_topic.clone(),
            _ => Some(target),
        };
        debug!(relationship = %relationship_type, parent = ?parent, "Parent resolved");
        Ok(parent)
    }

    /// The deepest node not yet visited or exhausted.
    pub fn get_deepest_unvisited_branch(&self) -> Option<&TopicNode> {
        self.navigator().get_deepest_unvisited_branch()
    }

    /// The node at the end of the current path.
    pub fn get_current_topic(&self) -> Option<&TopicNode> {
        let tree = self.manager.tree();
        tree.current_path().last().and_then(|id| tree.get(id))
    }

    /// Depth of a node computed from its root.
    pub fn get_depth_from_root(&self, node_id: &str) -> AppResult<u32> {
        self.navigator().get_depth_from_root(node_id)
    }

    /// Record a visit to a topic.
    pub fn mark_topic_as_visited(&mut self, node_id: &str) -> AppResult<()> {
        self.manager.mark_visited(node_id)
    }

    /// Flag a topic as fully explored.
    pub fn mark_topic_as_exhausted(&mut self, node_id: &str) -> AppResult<()> {
        self.manager.mark_exhausted(node_id)
    }

    /// Aggregate tree statistics.
    pub fn get_stats(&self) -> TreeStats {
        self.manager.get_stats()
    }

    /// Current node with its path, children and siblings.
    pub fn get_current_position(&self) -> AppResult<CurrentPosition<'_>> {
        self.navigator().get_current_position()
    }

    /// Read-only query helper over the tree.
    pub fn navigator(&self) -> TreeNavigator<'_> {
        TreeNavigator::new(self.manager.tree())
    }

    /// The conversation tree.
    pub fn tree(&self) -> &ConversationTree {
        self.manager.tree()
    }

    /// The session this system grades.
    pub fn session_id(&self) -> &str {
        self.manager.session_id()
    }

    /// The scoring engine in use.
    pub fn scoring_engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Run the full tree-integrity check.
    pub fn validate_integrity(&self) -> AppResult<()> {
        self.manager.validate()
    }

    /// Drop every node, keeping the session.
    pub fn clear(&mut self) {
        self.manager.clear();
    }
}

impl SessionPayload for ConversationGradingSystem {
    fn tree(&self) -> &ConversationTree {
        self.manager.tree()
    }
}

fn screen_qa_pair(qa_pair: &QaPair) -> SecurityReport {
    let mut report = scan_for_security_issues(&qa_pair.question);
    report
        .issues
        .extend(scan_for_security_issues(&qa_pair.answer).issues);
    report
}

#[cfg(test)]
#[path = "system_tests.rs"]
mod system_tests;
