/// Execute an aggregate command in place: decide, then apply each event.
///
/// No persistence and no publication; this is the inline form of the
/// dispatcher pipeline, used by aggregate tests and by callers that rehydrate
/// state themselves.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: custody_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
