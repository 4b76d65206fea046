/// Result of resolving one batch of INITIATED questions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolveSummary {
    /// Records that received a real model answer.
    pub answered: u32,
    /// Records resolved without a model call because no snapshot was usable.
    pub no_context: u32,
    /// Records whose model call failed, timed out, or returned nothing usable.
    pub call_failures: u32,
    /// Status updates that could not be written.
    pub update_errors: u32,
}

/// Stats from one processed batch.
#[derive(Debug, Default, Clone)]
pub struct BatchStats {
    pub messages: u32,
    pub malformed: u32,
    pub duplicates: u32,
    pub unique_comments: u32,
    pub history: u32,
    pub selected: u32,
    pub persisted: u32,
    pub persist_failures: u32,
    pub log_append_failed: bool,
    pub resolve: ResolveSummary,
}

impl std::fmt::Display for BatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Batch Complete ===")?;
        writeln!(f, "Messages:          {}", self.messages)?;
        writeln!(f, "Malformed:         {}", self.malformed)?;
        writeln!(f, "Duplicates:        {}", self.duplicates)?;
        writeln!(f, "Unique comments:   {}", self.unique_comments)?;
        writeln!(f, "Known questions:   {}", self.history)?;
        writeln!(f, "Selected:          {}", self.selected)?;
        writeln!(f, "Persisted:         {}", self.persisted)?;
        if self.persist_failures > 0 {
            writeln!(f, "Persist failures:  {}", self.persist_failures)?;
        }
        if self.log_append_failed {
            writeln!(f, "Question log:      NOT UPDATED")?;
        }
        writeln!(f, "\nAnswers:")?;
        writeln!(f, "  Answered:        {}", self.resolve.answered)?;
        writeln!(f, "  No context:      {}", self.resolve.no_context)?;
        writeln!(f, "  Call failures:   {}", self.resolve.call_failures)?;
        if self.resolve.update_errors > 0 {
            writeln!(f, "  Update errors:   {}", self.resolve.update_errors)?;
        }
        Ok(())
    }
}
