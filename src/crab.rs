pub const CRAB: &str = r"
    _~^~^~_
\) /  o o  \ (/     OOB Crab
  '_   -   _'       catching what leaks out of band
  / '-----' \
";
