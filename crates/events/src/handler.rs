/// Execute an aggregate command deterministically (no IO, no async).
///
/// 1. **Decide**: `aggregate.handle(command)` validates and returns events (no mutation).
/// 2. **Evolve**: each event is applied to the aggregate in order.
///
/// If `handle` rejects the command nothing is applied, so the aggregate is
/// either fully advanced or untouched.
pub fn execute<A>(
    aggregate: &mut A,
    command: &A::Command,
) -> Result<Vec<A::Event>, A::Error>
where
    A: ngoledger_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
