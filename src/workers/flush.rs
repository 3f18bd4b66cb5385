use crate::state::AppState;

/// One no-op tick at the estimated sensor time. Publishes anything that a
/// lapsed window resolved into.
pub async fn run(state: &AppState) -> usize {
    let output = {
        let mut session = state.session().lock().await;
        session.flush()
    };
    let Some(output) = output else {
        return 0;
    };
    if !output.commands.is_empty() {
        tracing::debug!(count = output.commands.len(), "flush: commands resolved");
        state.publish(&output.commands);
    }
    output.commands.len()
}
