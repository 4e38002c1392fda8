mod base_fee;
