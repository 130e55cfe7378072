mod test_initiate_delay;
mod test_negotiation_deadline;
