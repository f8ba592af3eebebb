/// A component that is stepped once per clock edge.
pub trait Component {
    fn cycle(&mut self, cycle: u64);
}
