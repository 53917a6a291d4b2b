/// Execute an aggregate command in memory: decide, then apply each event.
///
/// Nothing is persisted. The infrastructure unit of work calls this for every
/// command it stages and appends the returned events on commit; unit tests
/// call it directly.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: shopledger_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
