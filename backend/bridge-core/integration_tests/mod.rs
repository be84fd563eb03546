mod correlator;
mod helpers;
mod link;
mod mode;
mod roster;
