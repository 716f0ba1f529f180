
#[cfg(test)]
mod aggregation;

#[cfg(test)]
mod layouts;
